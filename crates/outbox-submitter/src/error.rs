use bridge_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmitterError {
    #[error("no registered mapping for command type {0}")]
    UnknownCommandType(String),

    #[error("failed to encode payload for {command_type}: {source}")]
    EncodeFailed {
        command_type: String,
        source: serde_json::Error,
    },

    #[error("payload missing required field {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Fabric(#[from] fabric_gateway::FabricError),

    #[error(transparent)]
    Store(#[from] outbox_store::StoreError),
}

impl SubmitterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SubmitterError::UnknownCommandType(_) | SubmitterError::MissingField(_) => {
                ErrorKind::ChaincodeError
            }
            SubmitterError::EncodeFailed { .. } => ErrorKind::ChaincodeError,
            SubmitterError::Fabric(e) => e.kind(),
            SubmitterError::Store(e) => e.kind(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
