//! Session lifecycle against the backend daemon.
//!
//! A [`SessionManager`] keeps at most one [`Session`]. Each call to
//! [`SessionManager::reconcile`] either reuses it (same endpoint, connection
//! still up) or retires it and performs a fresh handshake, then synchronizes
//! both indexes and publishes [`SessionEvent`]s. Reconciliations are
//! serialized by the lock around the current session, so a session is never
//! retired while a sync still uses it.

use std::sync::Arc;

use clisync_rpc::{ClientError, Instance};
use futures_util::StreamExt;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::daemon::{Connector, DaemonConnection};
use crate::endpoint::Endpoint;
use crate::error::{Result, SessionError};
use crate::retry::{RetryOutcome, RetryPolicy, retry};
use crate::sink::OutputSink;
use crate::sync::IndexSynchronizer;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// A connection plus the instance its handshake produced.
#[derive(Debug)]
pub struct Session<C> {
    endpoint: Endpoint,
    connection: C,
    instance: Instance,
}

impl<C> Session<C> {
    #[must_use]
    pub fn new(endpoint: Endpoint, connection: C, instance: Instance) -> Self {
        Self {
            endpoint,
            connection,
            instance,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    #[must_use]
    pub fn instance(&self) -> Instance {
        self.instance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Retiring,
    HandshakeInFlight,
    IndexSyncInFlight,
    SessionReady,
}

/// Broadcast to subscribers after a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A reconciliation finished, whatever the sync outcome.
    ClientReady,
    /// Both indexes were updated during the reconciliation.
    IndexesUpdated,
}

/// What a successful reconciliation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub instance: Instance,
    /// The existing session was kept (endpoint unchanged).
    pub reused: bool,
    pub indexes_updated: bool,
}

pub struct SessionManager<K: Connector> {
    connector: K,
    synchronizer: IndexSynchronizer,
    connect_policy: RetryPolicy,
    default_host: String,
    current: Mutex<Option<Session<K::Connection>>>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl<K: Connector> SessionManager<K> {
    #[must_use]
    pub fn new(connector: K, sink: Arc<dyn OutputSink>, config: &Config) -> Self {
        let synchronizer = IndexSynchronizer::new(sink, config.sync.retry_policy());
        let (state, _) = watch::channel(SessionState::NoSession);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            connector,
            synchronizer,
            connect_policy: config.connection.retry_policy(),
            default_host: config.connection.default_host.clone(),
            current: Mutex::new(None),
            state,
            events,
        }
    }

    /// Receive `ClientReady` / `IndexesUpdated` from now on. Past events are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Endpoint of the current session. Waits for a running reconciliation.
    pub async fn current_endpoint(&self) -> Option<Endpoint> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|session| session.endpoint().clone())
    }

    /// Instance of the current session. Waits for a running reconciliation.
    pub async fn instance(&self) -> Option<Instance> {
        self.current.lock().await.as_ref().map(Session::instance)
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Session state: {:?} -> {:?}", previous, state);
        }
    }

    /// Bring the session in line with `endpoint`, then update both indexes.
    ///
    /// # Errors
    ///
    /// Fails when no session could be established: the endpoint is absent, the
    /// daemon is unreachable, or its handshake produced no instance. The manager
    /// holds no session afterwards and no event is published.
    pub async fn reconcile(&self, endpoint: Option<Endpoint>) -> Result<Reconciliation> {
        let mut current = self.current.lock().await;

        let reusable = match (current.as_ref(), endpoint.as_ref()) {
            (Some(session), Some(endpoint)) if session.endpoint() == endpoint => {
                let alive = !session.connection().is_closed();
                if !alive {
                    warn!("Connection to {} was lost, reconnecting", endpoint);
                }
                alive
            }
            _ => false,
        };

        let (session, reused) = match current.take() {
            Some(session) if reusable => {
                debug!("Endpoint unchanged, reusing session");
                (session, true)
            }
            previous => {
                if let Some(old) = previous {
                    self.set_state(SessionState::Retiring);
                    info!(
                        "Retiring session at {} (new endpoint: {})",
                        old.endpoint(),
                        endpoint.as_ref().map_or("<none>", Endpoint::as_str)
                    );
                    self.close(old).await;
                }

                let Some(endpoint) = endpoint else {
                    self.set_state(SessionState::NoSession);
                    warn!("No daemon endpoint available");
                    return Err(SessionError::MissingEndpoint);
                };

                self.set_state(SessionState::HandshakeInFlight);
                match self.open_session(endpoint).await {
                    Ok(session) => (session, false),
                    Err(e) => {
                        self.set_state(SessionState::NoSession);
                        error!("Failed to establish daemon session: {}", e);
                        return Err(e);
                    }
                }
            }
        };
        let session = current.insert(session);

        self.set_state(SessionState::IndexSyncInFlight);
        let indexes_updated = self.synchronizer.sync_all(session).await;
        self.set_state(SessionState::SessionReady);

        let _ = self.events.send(SessionEvent::ClientReady);
        if indexes_updated {
            let _ = self.events.send(SessionEvent::IndexesUpdated);
        }

        Ok(Reconciliation {
            instance: session.instance(),
            reused,
            indexes_updated,
        })
    }

    /// Release a session's connection. Call once per session.
    pub async fn close(&self, session: Session<K::Connection>) {
        let endpoint = session.endpoint;
        if let Err(e) = session.connection.close().await {
            warn!("Error closing connection to {}: {}", endpoint, e);
        } else {
            debug!("Closed connection to {}", endpoint);
        }
    }

    /// Retire the current session, if any.
    pub async fn shutdown(&self) {
        let mut current = self.current.lock().await;
        if let Some(session) = current.take() {
            self.set_state(SessionState::Retiring);
            self.close(session).await;
        }
        self.set_state(SessionState::NoSession);
    }

    /// Reconcile on every endpoint signal until the tracker is dropped.
    ///
    /// Signals that arrive during a reconciliation collapse into the latest
    /// value. Errors are logged and the loop keeps waiting.
    pub async fn run(&self, mut endpoints: watch::Receiver<Option<Endpoint>>) {
        loop {
            let endpoint = endpoints.borrow_and_update().clone();
            match self.reconcile(endpoint).await {
                Ok(outcome) => info!(
                    "Reconciled with {} (reused: {}, indexes updated: {})",
                    outcome.instance, outcome.reused, outcome.indexes_updated
                ),
                Err(e) => warn!("Reconciliation failed: {}", e),
            }

            if endpoints.changed().await.is_err() {
                debug!("Endpoint tracker dropped, stopping");
                break;
            }
        }

        self.shutdown().await;
    }

    async fn open_session(&self, endpoint: Endpoint) -> Result<Session<K::Connection>> {
        let address = endpoint.address(&self.default_host);
        let connection = self.connect(&address).await?;

        match handshake(&connection).await {
            Ok(instance) => {
                info!("Session ready at {} with {}", address, instance);
                Ok(Session::new(endpoint, connection, instance))
            }
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    warn!("Error closing connection after failed handshake: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn connect(&self, address: &str) -> Result<K::Connection> {
        let max_attempts = self.connect_policy.max_attempts;
        let outcome = retry(
            self.connect_policy,
            move || self.connector.connect(address),
            |attempt, err: &ClientError| {
                warn!(
                    "Connecting to {} failed (attempt {}/{}): {}",
                    address, attempt, max_attempts, err
                );
            },
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(SessionError::Connect {
                address: address.to_string(),
                attempts,
                source: last_error,
            }),
        }
    }
}

/// Consume the init stream and return the latest instance it delivered.
async fn handshake<C: DaemonConnection>(connection: &C) -> Result<Instance> {
    let mut responses = connection.init().await?;
    let mut instance = None;

    while let Some(response) = responses.next().await {
        let response = response?;
        if let Some(progress) = &response.progress {
            debug!(
                "Init progress: {} {} (completed: {})",
                progress.name.as_deref().unwrap_or(""),
                progress.message.as_deref().unwrap_or(""),
                progress.completed
            );
        }
        if let Some(problem) = &response.error {
            warn!("Daemon reported during init: {}", problem);
        }
        if response.instance.is_some() {
            instance = response.instance;
        }
    }

    instance.ok_or(SessionError::Initialization)
}

impl<K: Connector> std::fmt::Debug for SessionManager<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("default_host", &self.default_host)
            .finish_non_exhaustive()
    }
}
