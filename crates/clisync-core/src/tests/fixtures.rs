//! Test fixtures and helpers
//!
//! `FakeDaemon` scripts what the daemon streams and records every call in a
//! shared log (`connect:1`, `init:1`, `update:1:package`, `close:1`, ...).

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use clisync_rpc::{
    ClientError, DOWNLOAD_FAILED, DownloadProgress, IndexKind, InitResponse, Instance, ItemStream,
};
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::daemon::{Connector, DaemonConnection};
use crate::endpoint::Endpoint;
use crate::session::{SessionEvent, SessionManager};
use crate::sink::{ChannelSink, OutputChunk};

/// One scripted stream message.
#[derive(Debug, Clone)]
pub enum Step<T> {
    Item(T),
    Fail(&'static str),
}

#[derive(Default)]
struct State {
    next_connection: u64,
    log: Vec<String>,
    addresses: Vec<String>,
    update_instances: Vec<Instance>,
    connect_failures: u32,
    hung_up: HashSet<u64>,
    init_scripts: VecDeque<Vec<Step<InitResponse>>>,
    update_scripts: HashMap<IndexKind, VecDeque<Vec<Step<DownloadProgress>>>>,
}

#[derive(Clone, Default)]
pub struct FakeDaemon {
    state: Arc<Mutex<State>>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            daemon: self.clone(),
        }
    }

    /// A connection that was never dialed, for driving the synchronizer directly.
    pub fn connection(&self, id: u64) -> FakeConnection {
        FakeConnection {
            id,
            daemon: self.clone(),
        }
    }

    pub fn fail_connects(&self, times: u32) {
        self.lock().connect_failures = times;
    }

    /// Script the next handshake. Unscripted handshakes return `Instance { id: <connection> }`.
    pub fn script_init(&self, steps: Vec<Step<InitResponse>>) {
        self.lock().init_scripts.push_back(steps);
    }

    /// Script the next update stream for `kind`. Unscripted streams report one completion.
    pub fn script_update(&self, kind: IndexKind, steps: Vec<Step<DownloadProgress>>) {
        self.lock()
            .update_scripts
            .entry(kind)
            .or_default()
            .push_back(steps);
    }

    /// Make the next `times` update streams for `kind` fail immediately.
    pub fn fail_updates(&self, kind: IndexKind, times: usize) {
        for _ in 0..times {
            self.script_update(kind, vec![Step::Fail("network is unreachable")]);
        }
    }

    /// Drop connection `id` from the daemon side, as a daemon restart would.
    pub fn hang_up(&self, id: u64) {
        self.lock().hung_up.insert(id);
    }

    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.lock().addresses.clone()
    }

    pub fn update_instances(&self) -> Vec<Instance> {
        self.lock().update_instances.clone()
    }

    fn record(&self, entry: String) {
        self.lock().log.push(entry);
    }
}

pub struct FakeConnector {
    daemon: FakeDaemon,
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<FakeConnection, ClientError>> + Send {
        let daemon = self.daemon.clone();
        let address = address.to_string();
        async move {
            let mut state = daemon.lock();
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                state.log.push(format!("connect-failed:{address}"));
                return Err(ClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            state.next_connection += 1;
            let id = state.next_connection;
            state.log.push(format!("connect:{id}"));
            state.addresses.push(address);
            drop(state);
            Ok(daemon.connection(id))
        }
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    id: u64,
    daemon: FakeDaemon,
}

impl std::fmt::Debug for FakeDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDaemon").finish_non_exhaustive()
    }
}

/// Yields between items so concurrent callers get a chance to interleave.
fn scripted<T: Send + 'static>(steps: Vec<Step<T>>) -> ItemStream<T> {
    stream::iter(steps)
        .then(|step| async move {
            tokio::task::yield_now().await;
            match step {
                Step::Item(item) => Ok(item),
                Step::Fail(message) => Err(ClientError::Rpc {
                    code: DOWNLOAD_FAILED,
                    message: message.to_string(),
                }),
            }
        })
        .boxed()
}

impl DaemonConnection for FakeConnection {
    fn init(&self) -> impl Future<Output = Result<ItemStream<InitResponse>, ClientError>> + Send {
        let id = self.id;
        let daemon = self.daemon.clone();
        async move {
            let script = {
                let mut state = daemon.lock();
                state.log.push(format!("init:{id}"));
                state.init_scripts.pop_front()
            };
            let steps = script
                .unwrap_or_else(|| vec![Step::Item(InitResponse::with_instance(Instance { id }))]);
            Ok(scripted(steps))
        }
    }

    fn update_index(
        &self,
        instance: Instance,
        kind: IndexKind,
    ) -> impl Future<Output = Result<ItemStream<DownloadProgress>, ClientError>> + Send {
        let id = self.id;
        let daemon = self.daemon.clone();
        async move {
            let script = {
                let mut state = daemon.lock();
                if state.hung_up.contains(&id) {
                    state.log.push(format!("update-refused:{id}:{}", kind.label()));
                    return Err(ClientError::ConnectionClosed);
                }
                state.log.push(format!("update:{id}:{}", kind.label()));
                state.update_instances.push(instance);
                state
                    .update_scripts
                    .get_mut(&kind)
                    .and_then(VecDeque::pop_front)
            };
            let steps = script.unwrap_or_else(|| vec![Step::Item(DownloadProgress::completed())]);
            Ok(scripted(steps))
        }
    }

    fn is_closed(&self) -> bool {
        self.daemon.lock().hung_up.contains(&self.id)
    }

    fn close(self) -> impl Future<Output = Result<(), ClientError>> + Send {
        async move {
            self.daemon.record(format!("close:{}", self.id));
            Ok(())
        }
    }
}

pub fn endpoint(value: &str) -> Option<Endpoint> {
    Some(Endpoint::new(value).unwrap())
}

/// Defaults with connection retries that do not sleep.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.connection.connect_retry_delay_ms = 0;
    config
}

pub fn manager_with(
    daemon: &FakeDaemon,
    config: &Config,
) -> (
    SessionManager<FakeConnector>,
    mpsc::UnboundedReceiver<OutputChunk>,
) {
    let (sink, rx) = ChannelSink::new();
    let manager = SessionManager::new(daemon.connector(), Arc::new(sink), config);
    (manager, rx)
}

pub fn manager(
    daemon: &FakeDaemon,
) -> (
    SessionManager<FakeConnector>,
    mpsc::UnboundedReceiver<OutputChunk>,
) {
    manager_with(daemon, &test_config())
}

pub fn drain_output(rx: &mut mpsc::UnboundedReceiver<OutputChunk>) -> Vec<OutputChunk> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn texts(chunks: &[OutputChunk]) -> Vec<&str> {
    chunks.iter().map(|chunk| chunk.text.as_str()).collect()
}

pub fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}
