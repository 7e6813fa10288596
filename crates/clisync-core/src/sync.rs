//! Package and library index synchronization.

use std::sync::Arc;

use clisync_rpc::{ClientError, IndexKind};
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::daemon::DaemonConnection;
use crate::progress::ProgressTracker;
use crate::retry::{RetryOutcome, RetryPolicy, retry};
use crate::session::Session;
use crate::sink::{OutputChunk, OutputSink};

/// Runs index updates against a borrowed session and reports to a sink.
#[derive(Clone)]
pub struct IndexSynchronizer {
    sink: Arc<dyn OutputSink>,
    policy: RetryPolicy,
}

impl IndexSynchronizer {
    #[must_use]
    pub fn new(sink: Arc<dyn OutputSink>, policy: RetryPolicy) -> Self {
        Self { sink, policy }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Consume one update stream for `kind`, emitting a line per completed download.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the call cannot be opened or the stream fails.
    pub async fn sync_one<C: DaemonConnection>(
        &self,
        session: &Session<C>,
        kind: IndexKind,
    ) -> Result<(), ClientError> {
        let mut updates = session
            .connection()
            .update_index(session.instance(), kind)
            .await?;
        let mut tracker = ProgressTracker::new(kind);

        while let Some(progress) = updates.next().await {
            let progress = progress?;
            debug!(
                "[{}] progress: file={:?} downloaded={:?}/{:?} completed={}",
                kind, progress.file, progress.downloaded, progress.total_size, progress.completed
            );
            if let Some(line) = tracker.observe(&progress) {
                self.sink.append(OutputChunk::info(line));
            }
        }

        Ok(())
    }

    /// Update `kind` with bounded retries. Returns whether it eventually succeeded.
    ///
    /// Every failed attempt is reported to the sink; exhaustion adds one final
    /// line asking for a restart.
    pub async fn sync_with_retry<C: DaemonConnection>(
        &self,
        session: &Session<C>,
        kind: IndexKind,
    ) -> bool {
        let max_attempts = self.policy.max_attempts;
        let outcome = retry(
            self.policy,
            move || self.sync_one(session, kind),
            |attempt, err: &ClientError| {
                warn!("[{}] update attempt {}/{} failed: {}", kind, attempt, max_attempts, err);
                self.sink.append(OutputChunk::error(format!(
                    "Error while updating the {kind} (attempt {attempt}/{max_attempts}): {err}"
                )));
            },
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => {
                info!("[{}] updated after {} attempt(s)", kind, attempts);
                true
            }
            RetryOutcome::Exhausted { attempts, last_error } => {
                error!(
                    "[{}] giving up after {} attempts: {}",
                    kind, attempts, last_error
                );
                if last_error.is_connection_error() {
                    warn!("[{}] daemon connection lost, reconnecting on next reconcile", kind);
                }
                self.sink.append(OutputChunk::error(format!(
                    "Could not update the {kind}. Please restart to try again."
                )));
                false
            }
        }
    }

    /// Update the package index, then the library index.
    ///
    /// Both always run; the result is true only if both succeeded.
    pub async fn sync_all<C: DaemonConnection>(&self, session: &Session<C>) -> bool {
        let mut all_updated = true;
        for kind in IndexKind::ALL {
            let updated = self.sync_with_retry(session, kind).await;
            all_updated = all_updated && updated;
        }
        all_updated
    }
}

impl std::fmt::Debug for IndexSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSynchronizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
