//! RPC client for the backend daemon.
//!
//! One [`RpcClient`] owns one TCP connection. A background task reads frames and
//! routes them: responses complete unary calls or end streams, `$/stream`
//! notifications feed the stream opened by the matching request id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{self, BoxStream, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};
use crate::messages::{
    INIT_METHOD, DownloadProgress, IndexKind, InitRequest, InitResponse, Instance,
    UpdateIndexRequest,
};
use crate::protocol::{Message, Request, RequestId, Response};
use crate::transport::{CodecError, MessageCodec};

/// How long a unary call waits for its response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type FrameSink = SplitSink<Framed<TcpStream, MessageCodec>, Message>;
type FrameStream = SplitStream<Framed<TcpStream, MessageCodec>>;
type PendingMap = Arc<Mutex<PendingCalls>>;

/// A decoded server stream. Ends after the daemon's final response.
pub type ItemStream<T> = BoxStream<'static, Result<T>>;

/// Call waiting on the reader task
enum Pending {
    Unary(oneshot::Sender<Result<Response>>),
    Stream(mpsc::UnboundedSender<Result<Value>>),
}

/// Calls waiting on the reader task, plus whether the reader has stopped.
///
/// Both live under one lock so no call can be registered after the final drain.
#[derive(Default)]
struct PendingCalls {
    calls: HashMap<RequestId, Pending>,
    closed: bool,
}

/// RPC client bound to one daemon address
pub struct RpcClient {
    address: String,
    sender: Arc<Mutex<FrameSink>>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl RpcClient {
    /// Connect to the daemon listening at `address` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidAddress` for a malformed address and
    /// `ClientError::Io` if the TCP connection fails.
    pub async fn connect(address: &str) -> Result<Self> {
        validate_address(address)?;

        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to daemon at {}", address);

        let (sink, stream) = Framed::new(stream, MessageCodec::new()).split();
        let pending: PendingMap = Arc::new(Mutex::new(PendingCalls::default()));
        let reader = tokio::spawn(read_frames(stream, pending.clone()));

        Ok(Self {
            address: address.to_string(),
            sender: Arc::new(Mutex::new(sink)),
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the connection is gone: closed locally or dropped by the daemon.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        pending: Pending,
    ) -> Result<RequestId> {
        let id = self.next_request_id();
        {
            let mut calls = self.pending.lock().await;
            if calls.closed {
                return Err(ClientError::ConnectionClosed);
            }
            calls.calls.insert(id.clone(), pending);
        }

        trace!("Sending request: method={}, id={}", method, id);
        let request = Request::new(method, params, id.clone());
        let sent = self.sender.lock().await.send(Message::Request(request)).await;

        if let Err(e) = sent {
            self.pending.lock().await.calls.remove(&id);
            return Err(e.into());
        }
        Ok(id)
    }

    /// Send an RPC request and wait for its single response.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails, the connection closes, the daemon
    /// answers with an error, or the result cannot be deserialized.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        self.request_within(method, params, REQUEST_TIMEOUT).await
    }

    async fn request_within<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        let id = self.send_request(method, params, Pending::Unary(tx)).await?;

        let Ok(reply) = tokio::time::timeout(timeout, rx).await else {
            self.pending.lock().await.calls.remove(&id);
            return Err(ClientError::Timeout);
        };
        let response = reply.map_err(|_| ClientError::ConnectionClosed)??;

        if let Some(error) = response.error {
            return Err(error.into());
        }

        let result = response.result.ok_or(ClientError::UnexpectedResponse)?;
        Ok(serde_json::from_value(result)?)
    }

    /// Open a server-streaming call.
    ///
    /// The returned stream yields each decoded item, then ends when the daemon
    /// sends its final response. An error response or a lost connection is
    /// yielded as the last item.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn server_stream<T>(&self, method: &str, params: Option<Value>) -> Result<ItemStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.send_request(method, params, Pending::Stream(tx)).await?;

        let items = stream::poll_fn(move |cx| rx.poll_recv(cx)).map(|item| {
            item.and_then(|value| serde_json::from_value::<T>(value).map_err(ClientError::from))
        });
        Ok(items.boxed())
    }

    /// Start the initialization handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn init(&self) -> Result<ItemStream<InitResponse>> {
        let params = serde_json::to_value(InitRequest::default())?;
        self.server_stream(INIT_METHOD, Some(params)).await
    }

    /// Start an index update for `kind` within `instance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn update_index(
        &self,
        instance: Instance,
        kind: IndexKind,
    ) -> Result<ItemStream<DownloadProgress>> {
        let params = serde_json::to_value(UpdateIndexRequest { instance })?;
        self.server_stream(kind.method(), Some(params)).await
    }

    /// Close the connection. Calls still in flight fail with `ConnectionClosed`.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or shutting down the socket fails.
    pub async fn close(self) -> Result<()> {
        debug!("Closing connection to {}", self.address);
        let result = self.sender.lock().await.close().await;
        self.reader.abort();
        fail_pending(&self.pending, || ClientError::ConnectionClosed).await;
        result.map_err(ClientError::from)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn validate_address(address: &str) -> Result<()> {
    let valid = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(ClientError::InvalidAddress(address.to_string()))
    }
}

async fn read_frames(mut stream: FrameStream, pending: PendingMap) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Response(response)) => route_response(&pending, response).await,
            Ok(msg) => {
                if let Some(item) = msg.as_stream_item() {
                    route_stream_item(&pending, item.id, item.value).await;
                } else if let Some((method, _)) = msg.as_notification() {
                    trace!("Ignoring daemon notification: {}", method);
                } else {
                    warn!("Ignoring unexpected message from daemon: {:?}", msg);
                }
            }
            Err(e) => {
                warn!("Daemon connection failed: {}", e);
                let reason = e.to_string();
                fail_pending(&pending, || {
                    ClientError::Codec(CodecError::Io(std::io::Error::other(reason.clone())))
                })
                .await;
                return;
            }
        }
    }

    debug!("Daemon closed the connection");
    fail_pending(&pending, || ClientError::ConnectionClosed).await;
}

async fn route_response(pending: &PendingMap, response: Response) {
    let Some(call) = pending.lock().await.calls.remove(&response.id) else {
        trace!("Response for unknown request id {}", response.id);
        return;
    };

    match call {
        Pending::Unary(tx) => {
            let _ = tx.send(Ok(response));
        }
        Pending::Stream(tx) => {
            if let Some(error) = response.error {
                let _ = tx.send(Err(error.into()));
            }
        }
    }
}

async fn route_stream_item(pending: &PendingMap, id: RequestId, value: Value) {
    let mut pending = pending.lock().await;
    let Some(Pending::Stream(tx)) = pending.calls.get(&id) else {
        trace!("Stream item for unknown stream {}", id);
        return;
    };
    if tx.send(Ok(value)).is_err() {
        debug!("Stream {} dropped by consumer", id);
        pending.calls.remove(&id);
    }
}

async fn fail_pending(pending: &PendingMap, error: impl Fn() -> ClientError) {
    let mut pending = pending.lock().await;
    pending.closed = true;
    for (_, call) in pending.calls.drain() {
        match call {
            Pending::Unary(tx) => {
                let _ = tx.send(Err(error()));
            }
            Pending::Stream(tx) => {
                let _ = tx.send(Err(error()));
            }
        }
    }
}
