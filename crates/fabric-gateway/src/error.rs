use bridge_types::ErrorKind;
use thiserror::Error;

/// Errors surfaced by `submit` and `stream_events`.
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("failed to connect to fabric network: {0}")]
    Connect(String),

    #[error("chaincode rejected the transaction: {0}")]
    Chaincode(String),

    #[error("endorsement failed: {0}")]
    Endorsement(String),

    #[error("ordering service rejected the transaction: {0}")]
    Ordering(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("identity was rejected by channel MSP: {0}")]
    PermissionDenied(String),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("grpc status: {0}")]
    Status(#[from] tonic::Status),
}

impl FabricError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FabricError::Connect(_) => ErrorKind::FabricConnectError,
            FabricError::Chaincode(_) => ErrorKind::ChaincodeError,
            FabricError::Endorsement(_) => ErrorKind::EndorsementError,
            FabricError::Ordering(_) => ErrorKind::OrderingError,
            FabricError::Timeout(_) => ErrorKind::TimeoutError,
            FabricError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            FabricError::CircuitOpen => ErrorKind::CircuitOpen,
            FabricError::Wallet(_) => ErrorKind::FabricConnectError,
            FabricError::Transport(_) => ErrorKind::FabricConnectError,
            FabricError::Status(status) => status_to_kind(status),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

fn status_to_kind(status: &tonic::Status) -> ErrorKind {
    use tonic::Code;
    match status.code() {
        Code::DeadlineExceeded => ErrorKind::TimeoutError,
        Code::PermissionDenied | Code::Unauthenticated => ErrorKind::PermissionDenied,
        Code::Unavailable | Code::Aborted => ErrorKind::OrderingError,
        Code::FailedPrecondition | Code::InvalidArgument => ErrorKind::ChaincodeError,
        _ => ErrorKind::EndorsementError,
    }
}
