//! Studio Core - profile records and shared contracts
//!
//! Everything the editor, the store and the HTTP surface agree on:
//! - Profile records, membership tiers and partial updates
//! - Patch validation
//! - The error taxonomy and its JSON envelope
//! - Store and change-notification seams
//! - Configuration
//!
//! # Example
//!
//! ```rust
//! use studio_core::{Profile, ProfileId, OwnerId, ProfilePatch};
//!
//! let mut profile = Profile::new(ProfileId::new(), OwnerId::new());
//! let patch = ProfilePatch::new()
//!     .title("A")
//!     .merged(ProfilePatch::new().bio("B"));
//!
//! profile.apply_patch(&patch);
//! assert_eq!(profile.title, "A");
//! assert_eq!(profile.bio, "B");
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod redact;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{
    AuthConfig, ConfigError, MissingTimestampPolicy, RateLimitConfig, ServerConfig, StoreConfig,
    StudioConfig, SyncConfig,
};
pub use error::{ApiError, ErrorBody, ErrorEnvelope, FieldError, StoreError};
pub use redact::redact;
pub use store::{ChangeSource, ProfileStore, Subscription};
pub use types::{FlushRequest, MutationId, OwnerId, Profile, ProfileId, ProfilePatch, Tier};
pub use validation::validate_patch;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
