//! JSON-RPC 2.0 protocol types.
//!
//! Plain request/response covers unary calls. Server-streaming calls reuse the
//! same envelope: the daemon answers a request with any number of
//! [`STREAM_ITEM_METHOD`] notifications tagged with the request id, then closes
//! the stream with an ordinary response (success ends it, error fails it).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INVALID_INSTANCE: i32 = -32010;
pub const DOWNLOAD_FAILED: i32 = -32011;

/// Notification method carrying one item of a server stream.
pub const STREAM_ITEM_METHOD: &str = "$/stream";

/// JSON-RPC 2.0 Request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

impl Response {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 Notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// Build the notification that delivers one item of the stream opened by `id`.
    #[must_use]
    pub fn stream_item(id: RequestId, value: Value) -> Self {
        let params = StreamItem { id, value };
        Self::new(
            STREAM_ITEM_METHOD,
            Some(serde_json::to_value(params).unwrap_or(Value::Null)),
        )
    }
}

/// Params of a [`STREAM_ITEM_METHOD`] notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamItem {
    pub id: RequestId,
    pub value: Value,
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    #[must_use]
    pub fn invalid_instance(id: u64) -> Self {
        Self::new(INVALID_INSTANCE, format!("Invalid instance: {id}"))
    }

    #[must_use]
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::new(DOWNLOAD_FAILED, message)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Incoming message that could be a request, response, or notification.
///
/// Untagged: a notification on the wire usually decodes as a [`Request`]
/// without an id. Use [`Message::as_notification`] instead of matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Method and params when this message is a notification in either shape.
    #[must_use]
    pub fn as_notification(&self) -> Option<(&str, Option<&Value>)> {
        match self {
            Message::Notification(n) => Some((n.method.as_str(), n.params.as_ref())),
            Message::Request(r) if r.id.is_none() => Some((r.method.as_str(), r.params.as_ref())),
            _ => None,
        }
    }

    /// Decode a [`STREAM_ITEM_METHOD`] notification into its params.
    #[must_use]
    pub fn as_stream_item(&self) -> Option<StreamItem> {
        let (method, params) = self.as_notification()?;
        if method != STREAM_ITEM_METHOD {
            return None;
        }
        serde_json::from_value(params?.clone()).ok()
    }
}
