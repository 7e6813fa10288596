//! clisync entry point.
//!
//! Connects to the backend daemon, keeps one session per endpoint, and keeps
//! its package and library indexes up to date. Status lines go to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use clisync_core::config::{Config, Directories};
use clisync_core::{
    ChannelSink, Endpoint, EndpointTracker, OutputChunk, RpcConnector, SessionEvent,
    SessionManager,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod port_watcher;

/// Keep the daemon's indexes in sync
#[derive(Parser, Debug)]
#[command(name = "clisync")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["endpoint", "port_file"])))]
struct Args {
    /// Daemon endpoint: a port (`50051`) or `host:port`
    #[arg(long, value_name = "ENDPOINT")]
    endpoint: Option<Endpoint>,

    /// File the daemon publishes its port to; every change is a new endpoint signal
    #[arg(long, value_name = "PATH")]
    port_file: Option<PathBuf>,

    /// Custom config file (defaults to `~/.config/clisync/config.json`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Set up logging with file output for debugging.
/// In debug builds, defaults to debug level and logs to timestamped file.
/// In release builds, defaults to info level and logs to stderr.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clisync={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("clisync-{timestamp}.log");
        let log_path = temp_dir.join(&log_filename);

        #[cfg(unix)]
        {
            let symlink_path = temp_dir.join("clisync.log");
            let _ = std::fs::remove_file(&symlink_path);
            let _ = std::os::unix::fs::symlink(&log_path, &symlink_path);
        }

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .with(filter)
            .init();

        eprintln!("Logging to: {} (and stderr)", log_path.display());
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => match Directories::new() {
            Some(dirs) => dirs.config_file,
            None => {
                warn!("No home directory, using default config");
                return Ok(Config::default());
            }
        },
    };

    debug!("Loading config from {}", path.display());
    Config::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

async fn print_output(mut output: mpsc::UnboundedReceiver<OutputChunk>) {
    while let Some(chunk) = output.recv().await {
        if chunk.is_error() {
            eprintln!("{}", chunk.text);
        } else {
            println!("{}", chunk.text);
        }
    }
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::ClientReady) => info!("Daemon client ready"),
            Ok(SessionEvent::IndexesUpdated) => info!("Package and library indexes updated"),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!("Missed {} session events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging();

    let config = load_config(args.config)?;

    let (sink, output) = ChannelSink::new();
    let printer = tokio::spawn(print_output(output));

    let manager = SessionManager::new(RpcConnector, Arc::new(sink), &config);
    tokio::spawn(log_events(manager.subscribe()));

    let tracker = Arc::new(EndpointTracker::new(args.endpoint));
    let _watcher = args
        .port_file
        .map(|path| port_watcher::spawn_port_watcher(path, Arc::clone(&tracker)));

    info!("Starting clisync...");

    tokio::select! {
        () = manager.run(tracker.subscribe()) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("Interrupted, closing session");
            manager.shutdown().await;
        }
    }

    drop(manager);
    if printer.await.is_err() {
        warn!("Output printer task failed");
    }

    info!("clisync stopped");
    Ok(())
}
