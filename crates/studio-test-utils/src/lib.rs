//! Testing utilities for Studio workspace
//!
//! Shared fixtures plus scripted stand-ins for the store seams.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use studio_core::{
    ChangeSource, FlushRequest, OwnerId, Profile, ProfileId, ProfileStore, StoreError,
    Subscription, Tier,
};
use tokio::sync::broadcast;

/// Fixed base timestamp so test records compare deterministically
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn sample_tiers() -> Vec<Tier> {
    vec![
        Tier::new("fan", "Fan", 300, "USD").with_perks(["Monthly shoutout"]),
        Tier::new("patron", "Patron", 1_000, "USD").with_perks(["Early access", "Discord role"]),
    ]
}

pub fn sample_profile(owner: OwnerId) -> Profile {
    Profile::new(ProfileId::new(), owner)
        .with_title("Night Owl Studio")
        .with_tiers(sample_tiers())
        .with_updated_at(base_time())
}

/// Copy of `profile` stamped `secs` after [`base_time`]
pub fn at_offset(profile: &Profile, secs: i64) -> Profile {
    let mut next = profile.clone();
    next.updated_at = Some(base_time() + chrono::Duration::seconds(secs));
    next
}

/// In-memory store that records every flush request
///
/// Saves apply the patch and advance `updated_at` by one second. Failures and
/// latency can be scripted.
#[derive(Debug)]
pub struct RecordingStore {
    current: Mutex<Profile>,
    requests: Mutex<Vec<FlushRequest>>,
    loads: AtomicUsize,
    fail_next: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

impl RecordingStore {
    pub fn new(profile: Profile) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(profile),
            requests: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            latency: Mutex::new(None),
        })
    }

    /// Fail the next `count` saves with a transport error
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delay every save by `latency` (honours paused tokio time)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn requests(&self) -> Vec<FlushRequest> {
        self.requests.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Profile {
        self.current.lock().clone()
    }
}

#[async_trait]
impl ProfileStore for RecordingStore {
    async fn load(&self, id: ProfileId) -> Result<Profile, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let current = self.current.lock().clone();
        if current.id == id {
            Ok(current)
        } else {
            Err(studio_core::ApiError::profile_not_found(id).into())
        }
    }

    async fn save(&self, request: FlushRequest) -> Result<Profile, StoreError> {
        self.requests.lock().push(request.clone());

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let scripted_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(StoreError::Transport("scripted failure".to_string()));
        }

        let mut current = self.current.lock();
        current.apply_patch(&request.patch);
        let previous = current.updated_at.unwrap_or_else(base_time);
        current.updated_at = Some(previous + chrono::Duration::seconds(1));
        Ok(current.clone())
    }
}

/// Change source driven by the test
#[derive(Debug)]
pub struct ManualFeed {
    sender: broadcast::Sender<Profile>,
    active: Arc<AtomicUsize>,
}

impl ManualFeed {
    pub fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(16);
        Arc::new(Self {
            sender,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Push a snapshot to every subscriber
    pub fn push(&self, profile: Profile) {
        let _ = self.sender.send(profile);
    }

    /// Subscriptions not yet released
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl ChangeSource for ManualFeed {
    fn subscribe(&self, profile_id: ProfileId) -> Subscription {
        self.active.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        Subscription::new(profile_id, self.sender.subscribe(), move || {
            active.fetch_sub(1, Ordering::SeqCst);
        })
    }
}
