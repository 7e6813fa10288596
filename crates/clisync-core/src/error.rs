use clisync_rpc::ClientError;
use thiserror::Error;

/// Failures that end a reconciliation without a usable session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Daemon initialization finished without an instance")]
    Initialization,

    #[error("No daemon endpoint available")]
    MissingEndpoint,

    #[error("Could not connect to daemon at {address} after {attempts} attempt(s): {source}")]
    Connect {
        address: String,
        attempts: u32,
        source: ClientError,
    },

    #[error("Daemon transport error: {0}")]
    Transport(#[from] ClientError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Endpoint is empty")]
    Empty,

    #[error("Endpoint contains whitespace: {0:?}")]
    Whitespace(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
