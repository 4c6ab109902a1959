use std::net::SocketAddr;

use clap::Parser;
use fabric_gateway::FabricGatewayConfig;
use outbox_submitter::SubmitterConfig;
use projector::ProjectorConfig;

/// Log output format. `json` is for production deployments; `pretty` is
/// for local development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Top-level process configuration: tenant/projector identity, the
/// Postgres connection, the health server bind address, plus every
/// component config flattened in so one `BRIDGE_*`-prefixed environment
/// resolves the whole process.
#[derive(Debug, Clone, Parser)]
#[command(name = "bridge", about = "CQRS bridge between the API tier and the Fabric ledger")]
pub struct BridgeConfig {
    #[arg(long = "tenant-id", env = "BRIDGE_TENANT_ID")]
    pub tenant_id: String,

    /// Distinguishes this deployment's checkpoint row from another
    /// projector reading the same channel, e.g. during a backfill.
    #[arg(long = "projector-name", env = "BRIDGE_PROJECTOR_NAME", default_value = "default")]
    pub projector_name: String,

    #[arg(long = "database-url", env = "BRIDGE_DATABASE_URL")]
    pub database_url: String,

    #[arg(long = "submitter-pool-size", env = "BRIDGE_SUBMITTER_POOL_SIZE", default_value_t = 10)]
    pub submitter_pool_size: u32,

    #[arg(long = "projector-pool-size", env = "BRIDGE_PROJECTOR_POOL_SIZE", default_value_t = 5)]
    pub projector_pool_size: u32,

    #[arg(long = "http-addr", env = "BRIDGE_HTTP_ADDR", default_value = "0.0.0.0:9090")]
    pub http_addr: SocketAddr,

    #[arg(long = "log-format", env = "BRIDGE_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Liveness gate: a worker that hasn't published a heartbeat within
    /// this window is considered stuck.
    #[arg(long = "health-max-heartbeat-age-ms", env = "BRIDGE_HEALTH_MAX_HEARTBEAT_AGE_MS", default_value_t = 15_000)]
    pub health_max_heartbeat_age_ms: i64,

    #[command(flatten)]
    pub fabric: FabricGatewayConfig,

    #[command(flatten)]
    pub submitter: SubmitterConfig,

    #[command(flatten)]
    pub projector: ProjectorConfig,
}

impl BridgeConfig {
    pub fn health_max_heartbeat_age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.health_max_heartbeat_age_ms)
    }
}
