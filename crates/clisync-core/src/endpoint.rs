//! Daemon endpoint values and the channel that signals them.

use std::str::FromStr;

use tokio::sync::watch;

use crate::error::EndpointError;

/// Where the daemon listens: a bare port (`"50051"`) or `host:port`.
///
/// Compared by value; two signals carrying the same string are the same endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Validate and wrap an endpoint string. Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns `EndpointError::Empty` for a blank value and
    /// `EndpointError::Whitespace` if whitespace remains inside it.
    pub fn new(value: impl AsRef<str>) -> Result<Self, EndpointError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(EndpointError::Empty);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(EndpointError::Whitespace(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Parse an optional endpoint, mapping blank input to `None`.
    ///
    /// # Errors
    ///
    /// Returns `EndpointError::Whitespace` for non-blank input with inner whitespace.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, EndpointError> {
        match Self::new(value) {
            Ok(endpoint) => Ok(Some(endpoint)),
            Err(EndpointError::Empty) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Socket address to dial. A bare port is joined with `default_host`.
    #[must_use]
    pub fn address(&self, default_host: &str) -> String {
        if self.0.contains(':') {
            self.0.clone()
        } else {
            format!("{default_host}:{}", self.0)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publishes endpoint signals to a [`crate::SessionManager::run`] loop.
///
/// Every call to [`EndpointTracker::signal`] wakes the loop, even when the value
/// did not change: an unchanged endpoint still re-runs index synchronization.
/// Signals sent while a reconciliation is running collapse to the latest one.
#[derive(Debug)]
pub struct EndpointTracker {
    tx: watch::Sender<Option<Endpoint>>,
}

impl EndpointTracker {
    #[must_use]
    pub fn new(initial: Option<Endpoint>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn signal(&self, endpoint: Option<Endpoint>) {
        self.tx.send_replace(endpoint);
    }

    #[must_use]
    pub fn current(&self) -> Option<Endpoint> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Endpoint>> {
        self.tx.subscribe()
    }
}

impl Default for EndpointTracker {
    fn default() -> Self {
        Self::new(None)
    }
}
