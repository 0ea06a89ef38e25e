//! Save status reported to the editor

use chrono::{DateTime, Utc};

/// Save indicator state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing to report
    #[default]
    Idle,
    /// Local edits waiting for the debounce deadline
    Unsaved,
    /// A write is in flight
    Saving,
    /// Last write succeeded
    Saved {
        /// Wall-clock time of the confirmation
        at: DateTime<Utc>,
    },
    /// Last write failed; clears itself after the configured delay
    Error {
        /// Failure message
        message: String,
    },
}

impl SaveStatus {
    /// Check if the error indicator is showing
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Short label for status bars
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Unsaved => "Unsaved changes",
            Self::Saving => "Saving…",
            Self::Saved { .. } => "Saved",
            Self::Error { .. } => "Could not save",
        }
    }
}

/// Counters kept by a running synchronizer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Local edits accepted
    pub edits_applied: usize,
    /// Writes issued
    pub flushes_started: usize,
    /// Writes confirmed
    pub flushes_succeeded: usize,
    /// Writes rejected or lost
    pub flushes_failed: usize,
    /// Remote snapshots that replaced local state
    pub remote_applied: usize,
    /// Remote snapshots discarded as stale
    pub remote_discarded: usize,
    /// Time of the last confirmed write
    pub last_saved_at: Option<DateTime<Utc>>,
}
