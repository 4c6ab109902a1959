use std::time::Duration;

use clap::Parser;

/// Tunables for the projector loop. Every field is
/// `BRIDGE_PROJECTOR_`-prefixed so `bin/bridge` resolves it the same way
/// it resolves `SubmitterConfig` and `FabricGatewayConfig`.
#[derive(Debug, Clone, Parser)]
pub struct ProjectorConfig {
    /// Used only when no checkpoint row exists yet
    /// `loadCheckpoint` default of `(configuredStartBlock, -1)`.
    #[arg(long = "projector-start-block", env = "BRIDGE_PROJECTOR_START_BLOCK", default_value_t = 0)]
    pub configured_start_block: u64,

    #[arg(
        long = "projector-reconnect-initial-backoff-ms",
        env = "BRIDGE_PROJECTOR_RECONNECT_INITIAL_BACKOFF_MS",
        default_value_t = 500
    )]
    pub reconnect_initial_backoff_ms: u64,

    /// Capped at the gateway's circuit-breaker reset timeout; `bin/bridge`
    /// wires this to the same value the gateway's
    /// `circuit_breaker.reset_timeout_ms` uses.
    #[arg(
        long = "projector-reconnect-max-backoff-ms",
        env = "BRIDGE_PROJECTOR_RECONNECT_MAX_BACKOFF_MS",
        default_value_t = 30_000
    )]
    pub reconnect_max_backoff_ms: u64,

    /// Readiness gate input; exceeding this marks
    /// `/readyz` unhealthy even though the projector keeps running.
    #[arg(long = "projector-lag-budget-blocks", env = "BRIDGE_PROJECTOR_LAG_BUDGET_BLOCKS", default_value_t = 50)]
    pub lag_budget_blocks: i64,

    /// Schema mismatches are advisory by default; flipping this promotes
    /// a validation failure to a hard stop (`SchemaValidationFailure`).
    #[arg(long = "projector-strict-schema", env = "BRIDGE_PROJECTOR_STRICT_SCHEMA", default_value_t = false)]
    pub strict_schema: bool,

    /// Bounded retries for `HandlerError`, before the event
    /// is written to the DLQ and the checkpoint advances past it anyway.
    #[arg(long = "projector-handler-max-attempts", env = "BRIDGE_PROJECTOR_HANDLER_MAX_ATTEMPTS", default_value_t = 3)]
    pub handler_max_attempts: u32,

    #[arg(
        long = "projector-handler-retry-backoff-ms",
        env = "BRIDGE_PROJECTOR_HANDLER_RETRY_BACKOFF_MS",
        default_value_t = 200
    )]
    pub handler_retry_backoff_ms: u64,
}

impl ProjectorConfig {
    pub fn reconnect_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_backoff_ms)
    }

    pub fn reconnect_max_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_backoff_ms)
    }

    pub fn handler_retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.handler_retry_backoff_ms.saturating_mul(attempt as u64))
    }
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            configured_start_block: 0,
            reconnect_initial_backoff_ms: 500,
            reconnect_max_backoff_ms: 30_000,
            lag_budget_blocks: 50,
            strict_schema: false,
            handler_max_attempts: 3,
            handler_retry_backoff_ms: 200,
        }
    }
}
