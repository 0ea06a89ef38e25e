//! Listener lifecycle

use crate::routes::routes;
use crate::state::AppState;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Server startup failures
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configured address is not `ip:port`
    #[error("invalid bind address {address}: {source}")]
    InvalidAddress {
        /// Configured value
        address: String,
        /// Parse failure
        #[source]
        source: std::net::AddrParseError,
    },

    /// Listener could not be bound
    #[error("failed to bind: {0}")]
    Bind(#[from] warp::Error),
}

/// Parse a configured `host:port`
///
/// # Errors
/// `ServerError::InvalidAddress` if the value is not a socket address
pub fn parse_address(address: &str) -> Result<SocketAddr, ServerError> {
    address
        .parse()
        .map_err(|source| ServerError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

/// Bind the routes; the returned future runs until `shutdown` resolves
///
/// Port 0 binds an ephemeral port; the actual address is returned.
///
/// # Errors
/// `ServerError::Bind` if the address is unavailable
pub fn bind(
    state: AppState,
    address: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>), ServerError> {
    let (bound, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(address, shutdown)?;
    info!(address = %bound, "listening");
    Ok((bound, server))
}

/// Periodically drop closed rate-limit windows
pub fn spawn_limiter_sweeper(state: &AppState, period: Duration) -> JoinHandle<()> {
    let limiter = std::sync::Arc::clone(&state.limiter);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = limiter.purge_expired(Instant::now());
            if purged > 0 {
                debug!(purged, remaining = limiter.tracked(), "purged rate-limit windows");
            }
        }
    })
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
