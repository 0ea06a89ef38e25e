//! Studio Store - backend side of the profile record
//!
//! - [`MemoryProfileStore`]: owner-scoped records with store-stamped,
//!   strictly increasing `updated_at`
//! - [`ChangeFeed`]: per-record broadcast of committed writes
//! - [`IdempotencyCache`]: mutation-id deduplication (moka)
//! - [`FixedWindowLimiter`]: per-key request budget
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use studio_core::{FlushRequest, OwnerId, Profile, ProfileId, ProfilePatch};
//! use studio_store::MemoryProfileStore;
//!
//! # tokio_test_block(async {
//! let store = Arc::new(MemoryProfileStore::default());
//! let owner = OwnerId::new();
//! let profile = store.create(Profile::new(ProfileId::new(), owner)).unwrap();
//!
//! let request = FlushRequest::new(profile.id, ProfilePatch::new().title("A"));
//! let saved = store.update(owner, request).await.unwrap();
//! assert_eq!(saved.title, "A");
//! assert!(saved.updated_at > profile.updated_at);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod feed;
pub mod idempotency;
pub mod memory;
pub mod rate_limit;

pub use feed::ChangeFeed;
pub use idempotency::{Committed, IdempotencyCache, IdempotencyStats};
pub use memory::{MemoryProfileStore, ScopedStore};
pub use rate_limit::FixedWindowLimiter;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
