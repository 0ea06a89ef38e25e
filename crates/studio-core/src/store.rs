//! Store seams
//!
//! The synchronizer talks to its backend through two traits:
//! - [`ProfileStore`] reads a record and writes accumulated patches
//! - [`ChangeSource`] pushes snapshots of a record whenever it changes
//!
//! Subscriptions are explicitly owned [`Subscription`] handles. Dropping the
//! handle (or calling [`Subscription::unsubscribe`]) releases it.

use crate::error::StoreError;
use crate::types::{FlushRequest, Profile, ProfileId};
use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

/// Read/write access to profile records
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read the current record
    ///
    /// # Errors
    /// `StoreError` if the record is missing, not visible to the caller, or
    /// the store is unreachable
    async fn load(&self, id: ProfileId) -> Result<Profile, StoreError>;

    /// Apply an accumulated patch and return the authoritative record
    ///
    /// # Errors
    /// `StoreError` on validation, ownership or transport failure
    async fn save(&self, request: FlushRequest) -> Result<Profile, StoreError>;
}

/// Push channel of record snapshots
pub trait ChangeSource: Send + Sync {
    /// Subscribe to changes of one record
    fn subscribe(&self, profile_id: ProfileId) -> Subscription;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Owned subscription to one record's change notifications
pub struct Subscription {
    profile_id: ProfileId,
    receiver: Option<broadcast::Receiver<Profile>>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Wrap a broadcast receiver; `release` runs exactly once when the
    /// subscription ends
    pub fn new(
        profile_id: ProfileId,
        receiver: broadcast::Receiver<Profile>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            profile_id,
            receiver: Some(receiver),
            release: Some(Box::new(release)),
        }
    }

    /// Subscription that never delivers anything
    #[inline]
    #[must_use]
    pub fn detached(profile_id: ProfileId) -> Self {
        Self {
            profile_id,
            receiver: None,
            release: None,
        }
    }

    /// Subscribed record
    #[inline]
    #[must_use]
    pub fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    /// Check if the subscription can still deliver snapshots
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Wait for the next snapshot of the subscribed record
    ///
    /// Snapshots for other records are skipped. Returns `None` once the
    /// channel is closed; lagging drops the missed snapshots and keeps going.
    pub async fn next(&mut self) -> Option<Profile> {
        let receiver = self.receiver.as_mut()?;

        loop {
            match receiver.recv().await {
                Ok(profile) if profile.id == self.profile_id => return Some(profile),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        profile_id = %self.profile_id,
                        skipped,
                        "change subscription lagged"
                    );
                }
                Err(RecvError::Closed) => break,
            }
        }

        self.receiver = None;
        None
    }

    /// Release the subscription
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver = None;
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("profile_id", &self.profile_id)
            .field("active", &self.is_active())
            .finish()
    }
}
