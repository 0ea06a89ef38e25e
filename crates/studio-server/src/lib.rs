//! Studio Server - JSON-over-HTTP surface for profiles
//!
//! Thin warp layer over [`studio_store::MemoryProfileStore`]: bearer-token
//! authentication, per-owner rate limiting, and the shared error envelope.
//! Errors are raised close to the violation and converted to a response once,
//! in [`rejection::handle_rejection`].

#![warn(unreachable_pub)]

pub mod auth;
pub mod rejection;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{Authenticator, StaticTokenAuthenticator};
pub use rejection::{handle_rejection, reject, Rejected};
pub use routes::routes;
pub use server::{bind, parse_address, shutdown_signal, spawn_limiter_sweeper, ServerError};
pub use state::AppState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
