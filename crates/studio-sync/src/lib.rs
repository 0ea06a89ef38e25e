//! Studio Sync - debounced profile auto-save
//!
//! Client-side synchronizer for one profile record:
//! - [`Accumulator`]: shallow-merges successive edits into one patch
//! - [`FlushMachine`]: `Idle → Pending → Flushing` debounce state machine,
//!   at most one write in flight
//! - [`ConflictResolver`]: last-writer-wins by last-modified timestamp
//! - [`AutoSaveController`]: drives all of the above against a
//!   [`ProfileStore`](studio_core::ProfileStore) and a
//!   [`ChangeSource`](studio_core::ChangeSource)
//!
//! # Example
//!
//! ```rust,ignore
//! use studio_sync::AutoSaveController;
//! use studio_core::{ProfilePatch, SyncConfig};
//!
//! let editor = AutoSaveController::open(store, &feed, profile_id, SyncConfig::default()).await?;
//!
//! editor.apply(ProfilePatch::new().title("A"))?;
//! editor.apply(ProfilePatch::new().bio("B"))?;
//! // one write with {title: "A", bio: "B"} after 500ms of quiet
//!
//! editor.close().await;
//! ```

#![warn(unreachable_pub)]

pub mod accumulator;
pub mod controller;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod machine;
pub mod resolver;
pub mod status;

pub use accumulator::Accumulator;
pub use controller::AutoSaveController;
pub use error::SyncError;
#[cfg(feature = "http")]
pub use http::HttpProfileStore;
pub use machine::{FlushMachine, Phase, Settled};
pub use resolver::{ConflictResolver, Resolution};
pub use status::{SaveStatus, SyncStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
