use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Selects the connection profile and wallet directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum Network {
    Dev,
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Dev => "dev",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }
}

/// TLS material for the peer/orderer gRPC channels
#[derive(Debug, Clone, Parser)]
pub struct TlsConfig {
    #[arg(long = "fabric-tls-enabled", env = "BRIDGE_FABRIC_TLS_ENABLED", default_value_t = true)]
    pub enabled: bool,

    #[arg(long = "fabric-tls-cert", env = "BRIDGE_FABRIC_TLS_CERT")]
    pub cert: Option<PathBuf>,

    #[arg(long = "fabric-tls-key", env = "BRIDGE_FABRIC_TLS_KEY")]
    pub key: Option<PathBuf>,

    #[arg(long = "fabric-tls-ca-cert", env = "BRIDGE_FABRIC_TLS_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Authority override passed to `ClientTlsConfig::domain_name`. Needed
    /// when the peer's externally-issued certificate SAN doesn't match the
    /// internal DNS name the gRPC channel dials.
    #[arg(long = "fabric-tls-server-name-override", env = "BRIDGE_FABRIC_TLS_SERVER_NAME_OVERRIDE")]
    pub server_name_override: Option<String>,
}

#[derive(Debug, Clone, Parser)]
pub struct CircuitBreakerConfig {
    #[arg(
        long = "fabric-cb-failure-threshold",
        env = "BRIDGE_FABRIC_CB_FAILURE_THRESHOLD",
        default_value_t = 5
    )]
    pub failure_threshold: u32,

    #[arg(
        long = "fabric-cb-reset-timeout-ms",
        env = "BRIDGE_FABRIC_CB_RESET_TIMEOUT_MS",
        default_value_t = 30_000
    )]
    pub reset_timeout_ms: u64,

    #[arg(
        long = "fabric-cb-half-open-probe-count",
        env = "BRIDGE_FABRIC_CB_HALF_OPEN_PROBE_COUNT",
        default_value_t = 2
    )]
    pub half_open_probe_count: u32,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

/// Connection profile and wallet settings for one Fabric network,
/// resolved by `clap` with `BRIDGE_FABRIC_`-prefixed env fallbacks.
#[derive(Debug, Clone, Parser)]
pub struct FabricGatewayConfig {
    #[arg(long = "fabric-network", env = "BRIDGE_NETWORK", value_enum, default_value_t = Network::Dev)]
    pub network: Network,

    #[arg(long = "fabric-channel", env = "BRIDGE_FABRIC_CHANNEL")]
    pub channel: String,

    #[arg(long = "fabric-chaincode", env = "BRIDGE_FABRIC_CHAINCODE")]
    pub chaincode: String,

    #[arg(long = "fabric-msp-id", env = "BRIDGE_FABRIC_MSP_ID")]
    pub msp_id: String,

    #[arg(long = "fabric-identity-label", env = "BRIDGE_FABRIC_IDENTITY_LABEL")]
    pub identity_label: String,

    #[arg(long = "fabric-wallet-dir", env = "BRIDGE_FABRIC_WALLET_DIR", default_value = "./wallets")]
    pub wallet_dir: PathBuf,

    #[arg(long = "fabric-peer-endpoint", env = "BRIDGE_FABRIC_PEER_ENDPOINT")]
    pub peer_endpoint: String,

    #[arg(long = "fabric-orderer-endpoint", env = "BRIDGE_FABRIC_ORDERER_ENDPOINT")]
    pub orderer_endpoint: String,

    #[command(flatten)]
    pub tls: TlsConfig,

    #[arg(long = "fabric-submit-timeout-ms", env = "BRIDGE_FABRIC_SUBMIT_TIMEOUT_MS", default_value_t = 5_000)]
    pub submit_timeout_ms: u64,

    #[arg(long = "fabric-endorse-timeout-ms", env = "BRIDGE_FABRIC_ENDORSE_TIMEOUT_MS", default_value_t = 3_000)]
    pub endorse_timeout_ms: u64,

    #[command(flatten)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl FabricGatewayConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn endorse_timeout(&self) -> Duration {
        Duration::from_millis(self.endorse_timeout_ms)
    }

    /// `{wallet_dir}/{network}/{identity_label}/`
    pub fn identity_dir(&self) -> PathBuf {
        self.wallet_dir
            .join(self.network.as_str())
            .join(&self.identity_label)
    }
}
