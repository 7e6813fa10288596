//! Port file watcher: turns changes of the daemon's port file into endpoint signals.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use clisync_core::{Endpoint, EndpointTracker};
use notify::Watcher;
use tracing::{debug, error, info, warn};

const WRITE_SETTLE_DELAY: Duration = Duration::from_millis(100);
const PORT_FILE_DEBOUNCE: Duration = Duration::from_millis(200);

pub struct PortWatcher {
    _watcher_thread: std::thread::JoinHandle<()>,
    _bridge_thread: std::thread::JoinHandle<()>,
}

/// Watch `port_file` and signal `tracker` with its contents after every change.
///
/// The file is read once up front so a daemon that is already running is picked up.
pub fn spawn_port_watcher(port_file: PathBuf, tracker: Arc<EndpointTracker>) -> PortWatcher {
    tracker.signal(read_endpoint(&port_file));

    let (sync_tx, sync_rx) = mpsc::channel::<()>();

    let watched = port_file.clone();
    let watcher_thread = std::thread::spawn(move || {
        if let Err(e) = watch_port_file(&watched, &sync_tx) {
            error!("Port file watcher error: {e}");
        }
    });

    let bridge_thread = std::thread::spawn(move || {
        while sync_rx.recv().is_ok() {
            // Writers truncate before writing the new port
            std::thread::sleep(WRITE_SETTLE_DELAY);
            let endpoint = read_endpoint(&port_file);
            debug!(
                "Port file changed, endpoint now {}",
                endpoint.as_ref().map_or("<none>", Endpoint::as_str)
            );
            tracker.signal(endpoint);
        }
        debug!("Port file watcher channel closed");
    });

    PortWatcher {
        _watcher_thread: watcher_thread,
        _bridge_thread: bridge_thread,
    }
}

/// Current endpoint published in `path`. Missing, blank, or malformed files mean no endpoint.
pub fn read_endpoint(path: &Path) -> Option<Endpoint> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Cannot read port file {}: {}", path.display(), e);
            return None;
        }
    };

    match Endpoint::parse_optional(&content) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            warn!("Ignoring port file {}: {}", path.display(), e);
            None
        }
    }
}

fn watch_port_file(port_file: &Path, tx: &mpsc::Sender<()>) -> notify::Result<()> {
    let Some(parent) = port_file.parent() else {
        return Err(notify::Error::generic("port file has no parent directory"));
    };
    let file_name = port_file.file_name().map(ToOwned::to_owned);
    let debounce = Arc::new(StdMutex::new(
        Instant::now().checked_sub(PORT_FILE_DEBOUNCE).unwrap_or_else(Instant::now),
    ));

    let (watcher_tx, watcher_rx) = mpsc::channel();

    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<notify::Event>| match result {
            Ok(event) => match event.kind {
                notify::EventKind::Modify(_)
                | notify::EventKind::Create(_)
                | notify::EventKind::Remove(_) => {
                    if event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref())
                    {
                        let Ok(mut last_event) = debounce.lock() else {
                            error!("[port_watcher] Debounce mutex poisoned, skipping event");
                            return;
                        };
                        let now = Instant::now();
                        if now.duration_since(*last_event) > PORT_FILE_DEBOUNCE {
                            *last_event = now;
                            let _ = watcher_tx.send(());
                        }
                    }
                }
                _ => {}
            },
            Err(e) => {
                error!("Watcher error: {}", e);
            }
        })?;

    watcher.watch(parent, notify::RecursiveMode::NonRecursive)?;
    info!("Watching port file: {}", port_file.display());

    while watcher_rx.recv().is_ok() {
        if tx.send(()).is_err() {
            break;
        }
    }

    Ok(())
}
