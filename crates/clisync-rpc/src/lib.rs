//! Transport layer for talking to the backend daemon.
//!
//! # Architecture
//!
//! - [`protocol`]: JSON-RPC 2.0 message types, plus the `$/stream` convention
//!   for server-streaming calls
//! - [`messages`]: daemon payloads (`InitResponse`, `DownloadProgress`, ...)
//! - [`transport`]: length-prefixed codec for message framing
//! - [`client`]: TCP client with unary and server-streaming calls
//! - [`error`]: client error type
//!
//! # Example
//!
//! ```no_run
//! use clisync_rpc::{IndexKind, RpcClient};
//! use futures_util::StreamExt;
//!
//! # async fn example() -> Result<(), clisync_rpc::ClientError> {
//! let client = RpcClient::connect("localhost:50051").await?;
//!
//! let mut init = client.init().await?;
//! let mut instance = None;
//! while let Some(resp) = init.next().await {
//!     instance = resp?.instance.or(instance);
//! }
//!
//! if let Some(instance) = instance {
//!     let mut updates = client.update_index(instance, IndexKind::Package).await?;
//!     while let Some(progress) = updates.next().await {
//!         println!("{:?}", progress?);
//!     }
//! }
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use client::{ItemStream, REQUEST_TIMEOUT, RpcClient};
pub use error::{ClientError, Result};
pub use messages::{
    DownloadProgress, INIT_METHOD, IndexKind, InitRequest, InitResponse, Instance, TaskProgress,
    UpdateIndexRequest,
};
pub use protocol::{
    DOWNLOAD_FAILED, INVALID_INSTANCE, INVALID_PARAMS, JSONRPC_VERSION, METHOD_NOT_FOUND, Message,
    Notification, Request, RequestId, Response, RpcError, STREAM_ITEM_METHOD, StreamItem,
};
pub use transport::{CodecError, DEFAULT_MAX_FRAME_LEN, MessageCodec};
