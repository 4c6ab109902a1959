use thiserror::Error;

/// The shared error taxonomy, used as a classification label
/// (metrics, logging, DLQ reason) independent of which crate's concrete
/// `thiserror` type produced it. Every concrete error type exposes a
/// `fn kind(&self) -> ErrorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("config invalid")]
    ConfigInvalid,
    #[error("fabric connect error")]
    FabricConnectError,
    #[error("circuit open")]
    CircuitOpen,
    #[error("chaincode error")]
    ChaincodeError,
    #[error("permission denied")]
    PermissionDenied,
    #[error("timeout")]
    TimeoutError,
    #[error("endorsement error")]
    EndorsementError,
    #[error("ordering error")]
    OrderingError,
    #[error("schema validation failure")]
    SchemaValidationFailure,
    #[error("handler error")]
    HandlerError,
    #[error("checkpoint conflict")]
    CheckpointConflict,
}

impl ErrorKind {
    /// Whether the submitter should retry a command that failed with this
    /// kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::FabricConnectError
                | ErrorKind::CircuitOpen
                | ErrorKind::TimeoutError
                | ErrorKind::EndorsementError
                | ErrorKind::OrderingError
        )
    }
}
