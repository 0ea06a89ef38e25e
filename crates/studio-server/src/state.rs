//! Shared handler state

use crate::auth::{Authenticator, StaticTokenAuthenticator};
use std::sync::Arc;
use studio_core::{OwnerId, StudioConfig};
use studio_store::{FixedWindowLimiter, MemoryProfileStore};

/// Everything a handler needs, cheap to clone per request
#[derive(Clone)]
pub struct AppState {
    /// Profile records
    pub store: Arc<MemoryProfileStore>,
    /// Credential check
    pub auth: Arc<dyn Authenticator>,
    /// Per-owner write budget
    pub limiter: Arc<FixedWindowLimiter<OwnerId>>,
    /// Maximum accepted request body
    pub max_body_bytes: u64,
}

impl AppState {
    /// Build state from configuration
    #[must_use]
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            store: Arc::new(MemoryProfileStore::new(&config.store)),
            auth: Arc::new(StaticTokenAuthenticator::from_config(&config.auth)),
            limiter: Arc::new(FixedWindowLimiter::from_config(&config.rate_limit)),
            max_body_bytes: config.server.max_body_bytes,
        }
    }

    /// With a shared store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: Arc<MemoryProfileStore>) -> Self {
        self.store = store;
        self
    }

    /// With a custom authenticator
    #[inline]
    #[must_use]
    pub fn with_authenticator(mut self, auth: Arc<dyn Authenticator>) -> Self {
        self.auth = auth;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("profiles", &self.store.len())
            .field("rate_limited_keys", &self.limiter.tracked())
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}
