//! Keeps a session with the backend daemon and its indexes up to date.
//!
//! [`SessionManager`] reacts to endpoint signals, [`IndexSynchronizer`] runs
//! the package and library index updates with bounded retries, and status text
//! goes to an [`OutputSink`].

pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod progress;
pub mod retry;
pub mod session;
pub mod sink;
pub mod sync;

mod error;

#[cfg(test)]
mod tests;

pub use daemon::{Connector, DaemonConnection, RpcConnector};
pub use endpoint::{Endpoint, EndpointTracker};
pub use error::{ConfigError, EndpointError, Result, SessionError};
pub use progress::{ProgressState, ProgressTracker};
pub use retry::{RetryOutcome, RetryPolicy, retry};
pub use session::{Reconciliation, Session, SessionEvent, SessionManager, SessionState};
pub use sink::{ChannelSink, OutputChunk, OutputSink, Severity};
pub use sync::IndexSynchronizer;

pub use clisync_rpc::{DownloadProgress, IndexKind, InitResponse, Instance};
