//! Per-record change feed
//!
//! Every committed write is broadcast to the subscribers of that record. A
//! channel is created on first subscription and dropped again once a publish
//! finds nobody listening.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use studio_core::{ChangeSource, Profile, ProfileId, Subscription};
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast hub keyed by record id
#[derive(Debug)]
pub struct ChangeFeed {
    channels: DashMap<ProfileId, broadcast::Sender<Profile>>,
    capacity: usize,
    active: Arc<AtomicUsize>,
}

impl ChangeFeed {
    /// Create feed buffering `capacity` snapshots per record
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Deliver a snapshot to the record's subscribers
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, profile: &Profile) -> usize {
        let delivered = match self.channels.get(&profile.id) {
            Some(sender) => sender.send(profile.clone()).unwrap_or(0),
            None => return 0,
        };

        if delivered == 0 {
            self.channels
                .remove_if(&profile.id, |_, sender| sender.receiver_count() == 0);
        }
        trace!(profile_id = %profile.id, delivered, "published change");
        delivered
    }

    /// Subscriptions not yet released
    #[inline]
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Records with at least one open channel
    #[inline]
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(studio_core::StoreConfig::default().feed_capacity)
    }
}

impl ChangeSource for ChangeFeed {
    fn subscribe(&self, profile_id: ProfileId) -> Subscription {
        let receiver = self
            .channels
            .entry(profile_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        Subscription::new(profile_id, receiver, move || {
            active.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::OwnerId;

    #[tokio::test]
    async fn delivers_only_to_matching_record() {
        let feed = ChangeFeed::new(8);
        let watched = Profile::new(ProfileId::new(), OwnerId::new());
        let other = Profile::new(ProfileId::new(), OwnerId::new());

        let mut subscription = feed.subscribe(watched.id);
        assert_eq!(feed.publish(&other), 0);
        assert_eq!(feed.publish(&watched), 1);

        assert_eq!(subscription.next().await, Some(watched));
    }

    #[test]
    fn release_is_counted_and_idle_channels_dropped() {
        let feed = ChangeFeed::new(8);
        let profile = Profile::new(ProfileId::new(), OwnerId::new());

        let subscription = feed.subscribe(profile.id);
        assert_eq!(feed.active_subscriptions(), 1);
        assert_eq!(feed.channel_count(), 1);

        subscription.unsubscribe();
        assert_eq!(feed.active_subscriptions(), 0);

        assert_eq!(feed.publish(&profile), 0);
        assert_eq!(feed.channel_count(), 0);
    }
}
