//! Error types for the synchronizer

use studio_core::{ApiError, StoreError};

/// Synchronizer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Initial read failed
    #[error("failed to load profile: {0}")]
    Load(#[source] StoreError),

    /// Edit rejected by local validation
    #[error("invalid edit: {0}")]
    Invalid(#[source] ApiError),

    /// The synchronizer has been torn down
    #[error("auto-save is closed")]
    Closed,
}
