use thiserror::Error;

/// Composes every component error into the exit codes the process reports.
/// Lives here rather than in `bridge-types` because only this binary
/// depends on all four component crates — `bridge-types` is a leaf every
/// one of them depends on, so it cannot depend back on them.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Fabric(#[from] fabric_gateway::FabricError),

    #[error(transparent)]
    Store(#[from] outbox_store::StoreError),

    #[error("failed to build database pool: {0}")]
    Pool(String),

    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("health server failed: {0}")]
    HealthServer(String),

    #[error("worker exited with a fatal error: {0}")]
    Worker(String),
}

impl BridgeError {
    /// Process exit code, per the operational surface's disposition table.
    pub fn exit_code(&self) -> i32 {
        match self {
            BridgeError::ConfigInvalid(_) => 1,
            BridgeError::Fabric(_) => 2,
            BridgeError::Store(_) | BridgeError::Pool(_) => 3,
            BridgeError::Metrics(_) | BridgeError::HealthServer(_) => 3,
            BridgeError::Worker(_) => 3,
        }
    }
}
