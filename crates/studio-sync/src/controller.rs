//! Auto-save controller
//!
//! Owns one record for the lifetime of an editing view:
//! - Loads it and subscribes to its change feed
//! - Applies local edits optimistically and accumulates them
//! - Writes the accumulated patch once the user pauses
//! - Reconciles pushed snapshots by last-modified timestamp
//!
//! All events for one record run through a single driver task, so timer
//! expiry, write completion and pushed snapshots never interleave inside a
//! handler. Closing (or dropping) the controller cancels the debounce timer
//! and releases the subscription; a write already in flight still completes
//! on the store side but its result is discarded.

use crate::error::SyncError;
use crate::machine::{FlushMachine, Settled};
use crate::resolver::{ConflictResolver, Resolution};
use crate::status::{SaveStatus, SyncStats};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use studio_core::{
    validate_patch, ChangeSource, FlushRequest, MutationId, Profile, ProfileId, ProfilePatch,
    ProfileStore, StoreError, Subscription, SyncConfig,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Commands sent from the controller to its driver
#[derive(Debug)]
enum Command {
    Apply(ProfilePatch),
    FlushNow,
    Close,
}

type FlushOutcome = (MutationId, Result<Profile, StoreError>);

/// State shared between the controller and its driver
#[derive(Debug)]
struct Shared {
    profile: watch::Sender<Profile>,
    status: watch::Sender<SaveStatus>,
    unsaved: AtomicBool,
    stats: Mutex<SyncStats>,
}

/// Handle to a running auto-save synchronizer
#[derive(Debug)]
pub struct AutoSaveController {
    profile_id: ProfileId,
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl AutoSaveController {
    /// Load a record, subscribe to its changes and start the driver
    ///
    /// The subscription is opened before the read so no change between the
    /// two is missed; anything older than the loaded record is discarded by
    /// the timestamp comparison.
    ///
    /// # Errors
    /// `SyncError::Load` if the initial read fails (the subscription is
    /// released before returning)
    pub async fn open(
        store: Arc<dyn ProfileStore>,
        source: &dyn ChangeSource,
        profile_id: ProfileId,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let subscription = source.subscribe(profile_id);

        let profile = store.load(profile_id).await.map_err(|e| {
            warn!(%profile_id, error = %e, "initial profile load failed");
            SyncError::Load(e)
        })?;
        info!(%profile_id, "auto-save opened");

        let (profile_tx, _) = watch::channel(profile);
        let (status_tx, _) = watch::channel(SaveStatus::Idle);
        let shared = Arc::new(Shared {
            profile: profile_tx,
            status: status_tx,
            unsaved: AtomicBool::new(false),
            stats: Mutex::new(SyncStats::default()),
        });

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            store,
            subscription,
            machine: FlushMachine::new(profile_id, config.debounce()),
            resolver: ConflictResolver::new(config.missing_timestamp),
            shared: Arc::clone(&shared),
            commands: commands_rx,
            results_tx,
            results_rx,
            error_clear: config.error_clear(),
            error_clear_at: None,
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            profile_id,
            commands: commands_tx,
            shared,
            task: Some(task),
        })
    }

    /// Record being edited
    #[inline]
    #[must_use]
    pub fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    /// Apply a local edit
    ///
    /// The edit is visible in [`snapshot`](Self::snapshot) immediately and is
    /// written after the debounce delay together with any other edits made
    /// in the meantime.
    ///
    /// # Errors
    /// - `SyncError::Invalid` if the edit fails validation (nothing changes)
    /// - `SyncError::Closed` after teardown
    pub fn apply(&self, patch: ProfilePatch) -> Result<(), SyncError> {
        validate_patch(&patch).map_err(SyncError::Invalid)?;
        if self.commands.is_closed() {
            return Err(SyncError::Closed);
        }
        if patch.is_empty() {
            return Ok(());
        }

        self.shared
            .profile
            .send_modify(|profile| profile.apply_patch(&patch));
        self.shared.unsaved.store(true, Ordering::SeqCst);

        self.commands
            .send(Command::Apply(patch))
            .map_err(|_| SyncError::Closed)
    }

    /// Write pending edits without waiting for the debounce delay
    ///
    /// # Errors
    /// `SyncError::Closed` after teardown
    pub fn flush_now(&self) -> Result<(), SyncError> {
        self.commands
            .send(Command::FlushNow)
            .map_err(|_| SyncError::Closed)
    }

    /// Currently displayed record
    #[must_use]
    pub fn snapshot(&self) -> Profile {
        self.shared.profile.borrow().clone()
    }

    /// Current save status
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver that observes every displayed-record change
    #[must_use]
    pub fn watch_profile(&self) -> watch::Receiver<Profile> {
        self.shared.profile.subscribe()
    }

    /// Receiver that observes save status changes
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    /// Check if any local edit is not yet confirmed by the store
    #[inline]
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.shared.unsaved.load(Ordering::SeqCst)
    }

    /// Time of the last confirmed write
    #[must_use]
    pub fn last_saved_at(&self) -> Option<chrono::DateTime<Utc>> {
        self.shared.stats.lock().last_saved_at
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.lock().clone()
    }

    /// Tear down: cancel the debounce timer and release the subscription
    ///
    /// Edits still waiting for their deadline are not written. Call
    /// [`flush_now`](Self::flush_now) first to keep them.
    pub async fn close(mut self) -> SyncStats {
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(profile_id = %self.profile_id, error = %e, "auto-save driver ended abnormally");
            }
        }
        self.stats()
    }
}

impl Drop for AutoSaveController {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Event loop owning the state machine and the subscription
struct Driver {
    store: Arc<dyn ProfileStore>,
    subscription: Subscription,
    machine: FlushMachine,
    resolver: ConflictResolver,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    results_tx: mpsc::UnboundedSender<FlushOutcome>,
    results_rx: mpsc::UnboundedReceiver<FlushOutcome>,
    error_clear: Duration,
    error_clear_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let deadline = self.machine.deadline();
            let clear_at = self.error_clear_at;
            let subscribed = self.subscription.is_active();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Apply(patch)) => self.on_apply(patch),
                    Some(Command::FlushNow) => self.on_flush_now(),
                    Some(Command::Close) | None => break,
                },
                Some((mutation_id, outcome)) = self.results_rx.recv() => {
                    self.on_flush_result(mutation_id, outcome);
                }
                () = sleep_until(deadline) => self.on_timer(),
                () = sleep_until(clear_at) => self.on_error_cleared(),
                remote = self.subscription.next(), if subscribed => match remote {
                    Some(profile) => self.on_remote(profile),
                    None => debug!(profile_id = %self.subscription.profile_id(), "change feed closed"),
                },
            }
        }

        let stats = self.shared.stats.lock().clone();
        info!(
            profile_id = %self.subscription.profile_id(),
            flushes = stats.flushes_started,
            failed = stats.flushes_failed,
            unsaved = self.machine.has_unsaved(),
            "auto-save closed"
        );
    }

    fn on_apply(&mut self, patch: ProfilePatch) {
        // Re-applying is idempotent; it restores the edit on top of a record
        // that was replaced after the caller applied it.
        self.shared
            .profile
            .send_modify(|profile| profile.apply_patch(&patch));
        self.machine.apply(patch, Instant::now());
        self.shared.stats.lock().edits_applied += 1;

        if self.machine.in_flight().is_none() {
            self.error_clear_at = None;
            self.set_status(SaveStatus::Unsaved);
        }
    }

    fn on_timer(&mut self) {
        if let Some(request) = self.machine.timer_fired(Instant::now()) {
            self.start_flush(request);
        } else if !self.machine.has_unsaved()
            && self.shared.unsaved.swap(false, Ordering::SeqCst)
        {
            let last_saved = self.shared.stats.lock().last_saved_at;
            self.set_status(last_saved.map_or(SaveStatus::Idle, |at| SaveStatus::Saved { at }));
        }
    }

    fn on_flush_now(&mut self) {
        if let Some(request) = self.machine.flush_now() {
            self.start_flush(request);
        }
    }

    fn start_flush(&mut self, request: FlushRequest) {
        debug!(
            profile_id = %request.profile_id,
            mutation_id = %request.mutation_id,
            fields = ?request.patch.field_names(),
            "flushing accumulated edits"
        );
        self.shared.stats.lock().flushes_started += 1;
        self.set_status(SaveStatus::Saving);

        let store = Arc::clone(&self.store);
        let results = self.results_tx.clone();
        let mutation_id = request.mutation_id;
        tokio::spawn(async move {
            let outcome = store.save(request).await;
            let _ = results.send((mutation_id, outcome));
        });
    }

    fn on_flush_result(&mut self, mutation_id: MutationId, outcome: Result<Profile, StoreError>) {
        let now = Instant::now();

        match outcome {
            Ok(saved) => {
                let queued = match self.machine.flush_succeeded(mutation_id, now) {
                    Settled::Ignored => return,
                    Settled::Clean => None,
                    Settled::Queued(patch) => Some(patch),
                };

                let local_ts = self.shared.profile.borrow().updated_at;
                if self.resolver.accepts_response(local_ts, saved.updated_at) {
                    let displayed = match &queued {
                        Some(patch) => saved.patched(patch),
                        None => saved,
                    };
                    self.shared.profile.send_replace(displayed);
                } else {
                    debug!(%mutation_id, "write confirmed after a newer snapshot; keeping newer state");
                }

                let saved_at = Utc::now();
                {
                    let mut stats = self.shared.stats.lock();
                    stats.flushes_succeeded += 1;
                    stats.last_saved_at = Some(saved_at);
                }

                if queued.is_some() {
                    self.set_status(SaveStatus::Unsaved);
                } else {
                    self.shared.unsaved.store(false, Ordering::SeqCst);
                    self.set_status(SaveStatus::Saved { at: saved_at });
                }
                debug!(%mutation_id, "flush confirmed");
            }
            Err(error) => {
                if !self.machine.flush_failed(mutation_id, now) {
                    return;
                }
                warn!(%mutation_id, %error, "flush failed");

                self.shared.stats.lock().flushes_failed += 1;
                self.error_clear_at = Some(now + self.error_clear);
                self.set_status(SaveStatus::Error {
                    message: error.to_string(),
                });
            }
        }
    }

    fn on_error_cleared(&mut self) {
        self.error_clear_at = None;
        if self.shared.status.borrow().is_error() {
            let next = if self.machine.deadline().is_some() {
                SaveStatus::Unsaved
            } else {
                SaveStatus::Idle
            };
            self.set_status(next);
        }
    }

    fn on_remote(&mut self, remote: Profile) {
        let local_ts = self.shared.profile.borrow().updated_at;

        match self.resolver.resolve(local_ts, remote.updated_at) {
            Resolution::ApplyRemote => {
                debug!(profile_id = %remote.id, "applying newer remote snapshot");
                self.shared.profile.send_replace(remote);
                self.shared.stats.lock().remote_applied += 1;
            }
            Resolution::KeepLocal => {
                debug!(profile_id = %remote.id, "discarding stale remote snapshot");
                self.shared.stats.lock().remote_discarded += 1;
            }
        }
    }

    fn set_status(&self, status: SaveStatus) {
        self.shared.status.send_replace(status);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use studio_core::{ApiError, OwnerId};
    use studio_test_utils::{sample_profile, ManualFeed};

    mock! {
        Store {}

        #[async_trait]
        impl ProfileStore for Store {
            async fn load(&self, id: ProfileId) -> Result<Profile, StoreError>;
            async fn save(&self, request: FlushRequest) -> Result<Profile, StoreError>;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_write_shows_error_then_clears() {
        let profile = sample_profile(OwnerId::new());
        let loaded = profile.clone();

        let mut store = MockStore::new();
        store
            .expect_load()
            .times(1)
            .returning(move |_| Ok(loaded.clone()));
        store.expect_save().times(1).returning(|_| {
            Err(StoreError::Api(ApiError::Authorization("not yours".into())))
        });

        let feed = ManualFeed::new();
        let controller = AutoSaveController::open(
            Arc::new(store),
            feed.as_ref(),
            profile.id,
            SyncConfig::default(),
        )
        .await
        .unwrap();

        controller.apply(ProfilePatch::new().title("A")).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(controller.status().is_error());
        assert_eq!(controller.snapshot().title, "A");
        assert!(controller.has_unsaved_changes());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(controller.status(), SaveStatus::Idle);
        assert!(controller.has_unsaved_changes());

        let stats = controller.close().await;
        assert_eq!(stats.flushes_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_releases_subscription() {
        let mut store = MockStore::new();
        store
            .expect_load()
            .returning(|id| Err(ApiError::profile_not_found(id).into()));

        let feed = ManualFeed::new();
        let result = AutoSaveController::open(
            Arc::new(store),
            feed.as_ref(),
            ProfileId::new(),
            SyncConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(SyncError::Load(_))));
        assert_eq!(feed.active_subscriptions(), 0);
    }
}
