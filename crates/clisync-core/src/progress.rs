//! Turns index download progress into status lines.
//!
//! The daemon reports a file name on some early event of each download and a
//! completion flag at the end. [`ProgressState::advance`] remembers the first
//! name seen since the last completion and produces one line per completion.

use clisync_rpc::{DownloadProgress, IndexKind};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProgressState {
    #[default]
    Idle,
    TrackingFile(String),
}

impl ProgressState {
    /// Pure transition: the next state plus the line to emit, if any.
    #[must_use]
    pub fn advance(self, kind: IndexKind, event: &DownloadProgress) -> (Self, Option<String>) {
        let state = match (self, event.file.as_deref()) {
            (ProgressState::Idle, Some(file)) if !file.is_empty() => {
                ProgressState::TrackingFile(file.to_string())
            }
            (state, _) => state,
        };

        if !event.completed {
            return (state, None);
        }

        let line = match state {
            ProgressState::TrackingFile(file) => completed_file_line(&file),
            ProgressState::Idle => format!("The {kind} has been successfully updated."),
        };
        (ProgressState::Idle, Some(line))
    }
}

/// Names containing whitespace are not quoted, so the quotes cannot be misread
/// as part of the name.
fn completed_file_line(file: &str) -> String {
    if file.chars().any(char::is_whitespace) {
        format!("{file} completed.")
    } else {
        format!("Download of '{file}' completed.")
    }
}

/// Progress state for one update stream of one index kind.
#[derive(Debug)]
pub struct ProgressTracker {
    kind: IndexKind,
    state: ProgressState,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(kind: IndexKind) -> Self {
        Self {
            kind,
            state: ProgressState::Idle,
        }
    }

    pub fn observe(&mut self, event: &DownloadProgress) -> Option<String> {
        let (state, line) = std::mem::take(&mut self.state).advance(self.kind, event);
        self.state = state;
        line
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        &self.state
    }
}
