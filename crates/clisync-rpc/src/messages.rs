//! Payloads exchanged with the backend daemon.

use serde::{Deserialize, Serialize};

/// Method that opens the initialization stream.
pub const INIT_METHOD: &str = "init";

/// Opaque handle the daemon issues during initialization.
///
/// Every request after the handshake carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    pub id: u64,
}

impl std::fmt::Display for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "instance#{}", self.id)
    }
}

/// Params of the `init` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitRequest {}

/// Progress of a long-running daemon task reported during initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// One message of the initialization stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<Instance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
    /// Non-fatal problem the daemon hit while loading (for example a broken index file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InitResponse {
    #[must_use]
    pub fn with_instance(instance: Instance) -> Self {
        Self {
            instance: Some(instance),
            ..Self::default()
        }
    }
}

/// Params of both index update calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateIndexRequest {
    pub instance: Instance,
}

/// One message of an index update stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<u64>,
    #[serde(default)]
    pub completed: bool,
}

impl DownloadProgress {
    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            file: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }
}

/// Which index an update call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Package,
    Library,
}

impl IndexKind {
    /// Both kinds in the order they are synchronized.
    pub const ALL: [IndexKind; 2] = [IndexKind::Package, IndexKind::Library];

    /// RPC method that streams updates for this index.
    #[must_use]
    pub fn method(self) -> &'static str {
        match self {
            IndexKind::Package => "update_index",
            IndexKind::Library => "update_libraries_index",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            IndexKind::Package => "package",
            IndexKind::Library => "library",
        }
    }

    /// Resolve an update method name back to its kind.
    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.method() == method)
    }
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} index", self.label())
    }
}
