//! In-memory profile store
//!
//! Backend side of the record:
//! - Row ownership: only the owner may write a record
//! - Writes are deduplicated by mutation id
//! - `updated_at` is stamped by the store and strictly increases per record
//! - Every committed write is published on the change feed

use crate::feed::ChangeFeed;
use crate::idempotency::{Committed, IdempotencyCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use studio_core::{
    validate_patch, ApiError, ChangeSource, FlushRequest, OwnerId, Profile, ProfileId,
    ProfileStore, StoreConfig, StoreError, Subscription,
};
use tracing::{debug, info, warn};

/// Concurrent map of profile records
#[derive(Debug)]
pub struct MemoryProfileStore {
    profiles: DashMap<ProfileId, Profile>,
    feed: ChangeFeed,
    idempotency: IdempotencyCache,
}

impl MemoryProfileStore {
    /// Create empty store
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            profiles: DashMap::new(),
            feed: ChangeFeed::new(config.feed_capacity),
            idempotency: IdempotencyCache::from_config(config),
        }
    }

    /// Insert a new record (onboarding)
    ///
    /// The stored `updated_at` is stamped here; any value on the input is
    /// ignored.
    ///
    /// # Errors
    /// - `ApiError::Conflict` if a record with this id already exists
    pub fn create(&self, mut profile: Profile) -> Result<Profile, ApiError> {
        use dashmap::mapref::entry::Entry;

        match self.profiles.entry(profile.id) {
            Entry::Occupied(_) => Err(ApiError::Conflict(format!(
                "profile already exists: {}",
                profile.id
            ))),
            Entry::Vacant(slot) => {
                profile.updated_at = Some(next_timestamp(None));
                slot.insert(profile.clone());
                info!(profile_id = %profile.id, owner = %profile.owner, "profile created");
                Ok(profile)
            }
        }
    }

    /// Read a record
    ///
    /// # Errors
    /// - `ApiError::NotFound` for an unknown id
    pub fn get(&self, id: ProfileId) -> Result<Profile, ApiError> {
        self.profiles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ApiError::profile_not_found(id))
    }

    /// Apply a flush on behalf of `owner`
    ///
    /// A mutation id that was already committed returns the record produced
    /// by that commit without writing again.
    ///
    /// # Errors
    /// - `ApiError::Validation` if the patch is invalid
    /// - `ApiError::NotFound` for an unknown record
    /// - `ApiError::Authorization` if `owner` does not own the record
    /// - `ApiError::Conflict` if the mutation id was used for another record
    ///   or by another caller
    pub async fn update(&self, owner: OwnerId, request: FlushRequest) -> Result<Profile, ApiError> {
        validate_patch(&request.patch)?;

        let mutation_id = request.mutation_id;
        let committed = self
            .idempotency
            .get_or_commit(mutation_id, async { self.commit(owner, &request) })
            .await?;

        if committed.profile_id != request.profile_id || committed.owner != owner {
            warn!(%mutation_id, profile_id = %request.profile_id, "mutation id reused");
            return Err(ApiError::Conflict(format!(
                "mutation id {mutation_id} already used for a different write"
            )));
        }

        Ok(committed.record)
    }

    fn commit(&self, owner: OwnerId, request: &FlushRequest) -> Result<Committed, ApiError> {
        let record = {
            let mut entry = self
                .profiles
                .get_mut(&request.profile_id)
                .ok_or_else(|| ApiError::profile_not_found(request.profile_id))?;

            if entry.owner != owner {
                return Err(ApiError::Authorization(format!(
                    "profile {} belongs to another account",
                    request.profile_id
                )));
            }

            entry.apply_patch(&request.patch);
            entry.updated_at = Some(next_timestamp(entry.updated_at));
            entry.clone()
        };

        let delivered = self.feed.publish(&record);
        debug!(
            profile_id = %record.id,
            mutation_id = %request.mutation_id,
            fields = ?request.patch.field_names(),
            delivered,
            "profile updated"
        );

        Ok(Committed {
            profile_id: record.id,
            owner,
            record,
        })
    }

    /// Change feed of this store
    #[inline]
    #[must_use]
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Check if the store holds no records
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// View of the store that writes as `owner`
    #[must_use]
    pub fn scoped(self: &Arc<Self>, owner: OwnerId) -> ScopedStore {
        ScopedStore {
            store: Arc::clone(self),
            owner,
        }
    }
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl ChangeSource for MemoryProfileStore {
    fn subscribe(&self, profile_id: ProfileId) -> Subscription {
        self.feed.subscribe(profile_id)
    }
}

/// Millisecond timestamp that is later than `previous`
///
/// Wall-clock time when possible; one millisecond past `previous` when the
/// clock has not advanced far enough.
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().timestamp_millis();
    let next = previous.map_or(now, |prev| now.max(prev.timestamp_millis() + 1));
    DateTime::from_timestamp_millis(next).unwrap_or_else(Utc::now)
}

/// [`MemoryProfileStore`] bound to one caller
#[derive(Debug, Clone)]
pub struct ScopedStore {
    store: Arc<MemoryProfileStore>,
    owner: OwnerId,
}

impl ScopedStore {
    /// Caller this view writes as
    #[inline]
    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

#[async_trait]
impl ProfileStore for ScopedStore {
    async fn load(&self, id: ProfileId) -> Result<Profile, StoreError> {
        Ok(self.store.get(id)?)
    }

    async fn save(&self, request: FlushRequest) -> Result<Profile, StoreError> {
        Ok(self.store.update(self.owner, request).await?)
    }
}

impl ChangeSource for ScopedStore {
    fn subscribe(&self, profile_id: ProfileId) -> Subscription {
        self.store.subscribe(profile_id)
    }
}
