use bridge_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("pool error: {0}")]
    Pool(String),

    #[error("migration failed: {0}")]
    Migration(String),

    /// `enqueue_command` rejects a blank aggregate id instead of silently
    /// accepting it.
    #[error("aggregate_id is required on every outbox command")]
    MissingAggregateId,

    /// Two consumers racing the same `(tenant_id, projector_name,
    /// channel)` checkpoint row — `CheckpointConflict`.
    #[error("checkpoint conflict for {tenant_id}/{projector_name}/{channel}: attempted to advance to ({attempted_block}, {attempted_index}) behind current ({current_block}, {current_index})")]
    CheckpointConflict {
        tenant_id: String,
        projector_name: String,
        channel: String,
        attempted_block: u64,
        attempted_index: i32,
        current_block: u64,
        current_index: i32,
    },

    #[error("command {0} not found")]
    CommandNotFound(uuid::Uuid),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::CheckpointConflict { .. } => ErrorKind::CheckpointConflict,
            StoreError::MissingAggregateId => ErrorKind::ConfigInvalid,
            _ => ErrorKind::ConfigInvalid,
        }
    }
}
