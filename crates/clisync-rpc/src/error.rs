//! Error types for the clisync-rpc crate.

use crate::protocol::RpcError;
use crate::transport::CodecError;

/// Errors that can occur talking to the daemon
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error: {code} - {message}")]
    Rpc { code: i32, message: String },

    #[error("Invalid endpoint address: {0}")]
    InvalidAddress(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,

    #[error("Unexpected response type")]
    UnexpectedResponse,
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        ClientError::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

impl ClientError {
    /// Whether the failure came from the connection rather than the daemon's answer.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Codec(_) | ClientError::ConnectionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;

    #[test]
    fn test_client_error_from_rpc_error() {
        let err: ClientError = RpcError::invalid_instance(12).into();
        match err {
            ClientError::Rpc { code, message } => {
                assert_eq!(code, protocol::INVALID_INSTANCE);
                assert!(message.contains("12"));
            }
            _ => panic!("Expected Rpc error"),
        }
    }

    #[test]
    fn test_client_error_display() {
        assert_eq!(ClientError::ConnectionClosed.to_string(), "Connection closed");
        assert_eq!(ClientError::Timeout.to_string(), "Request timeout");
        assert_eq!(
            ClientError::InvalidAddress("localhost:x".to_string()).to_string(),
            "Invalid endpoint address: localhost:x"
        );

        let err = ClientError::Rpc {
            code: protocol::DOWNLOAD_FAILED,
            message: "connection reset by peer".to_string(),
        };
        assert!(err.to_string().contains("-32011"));
        assert!(err.to_string().contains("connection reset by peer"));
    }

    #[test]
    fn test_connection_errors_classified() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(ClientError::from(io).is_connection_error());
        assert!(ClientError::ConnectionClosed.is_connection_error());
        assert!(!ClientError::Timeout.is_connection_error());
        assert!(!ClientError::from(RpcError::method_not_found()).is_connection_error());
    }

    #[test]
    fn test_client_error_from_codec() {
        let err: ClientError = CodecError::FrameTooLarge { len: 100, max: 10 }.into();
        assert!(matches!(err, ClientError::Codec(_)));
        assert!(err.to_string().contains("100"));
    }
}
