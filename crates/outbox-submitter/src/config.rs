use std::time::Duration;

use clap::Parser;

/// Tunables for the submitter loop Every field is
/// `BRIDGE_SUBMITTER_`-prefixed so `bin/bridge` can resolve it the same
/// way it resolves `FabricGatewayConfig`.
#[derive(Debug, Clone, Parser)]
pub struct SubmitterConfig {
    #[arg(long = "submitter-batch-size", env = "BRIDGE_SUBMITTER_BATCH_SIZE", default_value_t = 20)]
    pub batch_size: i64,

    #[arg(long = "submitter-max-attempts", env = "BRIDGE_SUBMITTER_MAX_ATTEMPTS", default_value_t = 8)]
    pub max_attempts: i32,

    #[arg(
        long = "submitter-stale-processing-age-ms",
        env = "BRIDGE_SUBMITTER_STALE_PROCESSING_AGE_MS",
        default_value_t = 60_000
    )]
    pub stale_processing_age_ms: i64,

    #[arg(long = "submitter-poll-interval-ms", env = "BRIDGE_SUBMITTER_POLL_INTERVAL_MS", default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    /// When the deployment runs a single replica, every aggregate is
    /// already serialized, so the per-aggregate advisory lock is skipped
    /// entirely. Flipping this on and off across restarts while more than
    /// one replica is running is unsafe — operators must not toggle it
    /// without draining the outbox first.
    #[arg(long = "submitter-single-worker-mode", env = "BRIDGE_SUBMITTER_SINGLE_WORKER_MODE", default_value_t = false)]
    pub single_worker_mode: bool,
}

impl SubmitterConfig {
    pub fn stale_processing_age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.stale_processing_age_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_attempts: 8,
            stale_processing_age_ms: 60_000,
            poll_interval_ms: 1_000,
            single_worker_mode: false,
        }
    }
}
