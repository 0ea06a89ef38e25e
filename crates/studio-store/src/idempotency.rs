//! Mutation-id deduplication using moka
//!
//! Remembers the outcome of every committed write by its client-generated
//! mutation id. A retried or duplicated request returns the remembered
//! record instead of being applied a second time. Concurrent requests with
//! the same id are coalesced: exactly one of them runs the commit.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use studio_core::{ApiError, MutationId, OwnerId, Profile, ProfileId, StoreConfig};

/// Outcome of a committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Record the write targeted
    pub profile_id: ProfileId,
    /// Caller that issued it
    pub owner: OwnerId,
    /// Record as returned to the caller
    pub record: Profile,
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyStats {
    /// Remembered mutation ids
    pub entry_count: u64,
}

/// Bounded, expiring map from mutation id to commit outcome
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    inner: Cache<MutationId, Arc<Committed>>,
}

impl IdempotencyCache {
    /// Create cache with max capacity and time-to-live
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Create cache from store settings
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            config.idempotency_capacity,
            Duration::from_secs(config.idempotency_ttl_secs),
        )
    }

    /// Remembered outcome for a mutation id
    pub async fn get(&self, mutation_id: &MutationId) -> Option<Committed> {
        self.inner
            .get(mutation_id)
            .await
            .map(|committed| committed.as_ref().clone())
    }

    /// Return the remembered outcome or run `commit` exactly once
    ///
    /// Failed commits are not remembered, so the caller may retry them under
    /// the same id.
    ///
    /// # Errors
    /// The error returned by `commit`
    pub async fn get_or_commit<F>(
        &self,
        mutation_id: MutationId,
        commit: F,
    ) -> Result<Committed, ApiError>
    where
        F: Future<Output = Result<Committed, ApiError>>,
    {
        self.inner
            .try_get_with(mutation_id, async { commit.await.map(Arc::new) })
            .await
            .map(|committed| committed.as_ref().clone())
            .map_err(|e| e.as_ref().clone())
    }

    /// Forget a mutation id
    #[inline]
    pub async fn invalidate(&self, mutation_id: &MutationId) {
        self.inner.invalidate(mutation_id).await;
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> IdempotencyStats {
        IdempotencyStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}
