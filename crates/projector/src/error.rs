use bridge_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectorError {
    #[error(transparent)]
    Fabric(#[from] fabric_gateway::FabricError),

    #[error(transparent)]
    Store(#[from] outbox_store::StoreError),

    #[error("payload missing required field {0}")]
    MissingField(&'static str),

    #[error("unrecognized vote choice {0:?}")]
    InvalidVoteChoice(String),

    #[error("schema validation failed in strict mode: {0}")]
    SchemaValidationFailed(String),

    /// The gateway's event stream ended without `cancel` firing — treated
    /// the same as a dropped connection, so the reconnect/backoff loop in
    /// `ProjectorWorker::run` re-establishes it from the last checkpoint.
    #[error("event stream closed unexpectedly")]
    StreamClosed,

    /// Two consumers racing the same checkpoint row. The projector does
    /// not retry this — it is an invariant violation and the process
    /// exits for the supervisor to restart.
    #[error("checkpoint conflict: another consumer is advancing this projector's checkpoint")]
    CheckpointConflict,
}

impl ProjectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProjectorError::Fabric(e) => e.kind(),
            ProjectorError::Store(e) => e.kind(),
            ProjectorError::MissingField(_) | ProjectorError::InvalidVoteChoice(_) => ErrorKind::HandlerError,
            ProjectorError::SchemaValidationFailed(_) => ErrorKind::SchemaValidationFailure,
            ProjectorError::CheckpointConflict => ErrorKind::CheckpointConflict,
            ProjectorError::StreamClosed => ErrorKind::FabricConnectError,
        }
    }
}
