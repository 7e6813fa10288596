//! The daemon as seen by the session manager.
//!
//! [`Connector`] and [`DaemonConnection`] are implemented for the TCP client in
//! `clisync-rpc`; tests substitute in-memory fakes.

use std::future::Future;

use clisync_rpc::{
    ClientError, DownloadProgress, IndexKind, InitResponse, Instance, ItemStream, RpcClient,
};

/// An open channel to the daemon, usable for the handshake and index updates.
pub trait DaemonConnection: Send + Sync + 'static {
    /// Open the initialization stream.
    fn init(&self) -> impl Future<Output = Result<ItemStream<InitResponse>, ClientError>> + Send;

    /// Open the update stream for one index.
    fn update_index(
        &self,
        instance: Instance,
        kind: IndexKind,
    ) -> impl Future<Output = Result<ItemStream<DownloadProgress>, ClientError>> + Send;

    /// True once the daemon side is gone; such a connection is never reused.
    fn is_closed(&self) -> bool;

    /// Release the connection.
    fn close(self) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// Opens connections to a daemon address.
pub trait Connector: Send + Sync + 'static {
    type Connection: DaemonConnection;

    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Connection, ClientError>> + Send;
}

/// Connects over TCP with [`RpcClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcConnector;

impl Connector for RpcConnector {
    type Connection = RpcClient;

    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Connection, ClientError>> + Send {
        RpcClient::connect(address)
    }
}

impl DaemonConnection for RpcClient {
    fn init(&self) -> impl Future<Output = Result<ItemStream<InitResponse>, ClientError>> + Send {
        RpcClient::init(self)
    }

    fn update_index(
        &self,
        instance: Instance,
        kind: IndexKind,
    ) -> impl Future<Output = Result<ItemStream<DownloadProgress>, ClientError>> + Send {
        RpcClient::update_index(self, instance, kind)
    }

    fn is_closed(&self) -> bool {
        RpcClient::is_closed(self)
    }

    fn close(self) -> impl Future<Output = Result<(), ClientError>> + Send {
        RpcClient::close(self)
    }
}
