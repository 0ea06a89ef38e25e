//! Fixed-window rate limiting
//!
//! Each key gets at most `max_requests` requests per window. A window opens
//! with the key's first request and resets once `window` has elapsed.
//!
//! # Memory
//!
//! Keys whose window has expired can be dropped with
//! [`FixedWindowLimiter::purge_expired`]; the server runs it periodically.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use studio_core::{ApiError, RateLimitConfig};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-key fixed-window request counter
#[derive(Debug)]
pub struct FixedWindowLimiter<K: Eq + Hash> {
    max_requests: u32,
    window: Duration,
    windows: DashMap<K, Window>,
}

impl<K> FixedWindowLimiter<K>
where
    K: Eq + Hash + std::fmt::Debug,
{
    /// Create limiter
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    /// Create limiter from settings
    #[must_use]
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Count a request for `key` now
    ///
    /// # Errors
    /// `ApiError::RateLimited` once the key has used up its window
    pub fn check(&self, key: K) -> Result<(), ApiError> {
        self.check_at(key, Instant::now())
    }

    /// Count a request for `key` at `now`
    ///
    /// # Errors
    /// `ApiError::RateLimited` once the key has used up its window
    pub fn check_at(&self, key: K, now: Instant) -> Result<(), ApiError> {
        let mut entry = self.windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(elapsed);
            warn!(key = ?entry.key(), requests = entry.count, max = self.max_requests, "rate limit exceeded");
            return Err(ApiError::RateLimited {
                retry_after_secs: ceil_secs(remaining),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop keys whose window has closed; returns how many were removed
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Keys currently tracked
    #[inline]
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = FixedWindowLimiter::new(3, secs(60));
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("alice", t0).is_ok());
        }
        let err = limiter.check_at("alice", t0 + secs(20)).unwrap_err();
        assert_eq!(err, ApiError::RateLimited { retry_after_secs: 40 });

        assert!(limiter.check_at("bob", t0).is_ok(), "keys are independent");
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = FixedWindowLimiter::new(1, secs(10));
        let t0 = Instant::now();

        assert!(limiter.check_at("k", t0).is_ok());
        assert!(limiter.check_at("k", t0 + secs(9)).is_err());
        assert!(limiter.check_at("k", t0 + secs(10)).is_ok());
    }

    #[test]
    fn purge_drops_only_closed_windows() {
        let limiter = FixedWindowLimiter::new(5, secs(10));
        let t0 = Instant::now();

        limiter.check_at("old", t0).unwrap();
        limiter.check_at("new", t0 + secs(8)).unwrap();

        assert_eq!(limiter.purge_expired(t0 + secs(12)), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(ceil_secs(Duration::from_millis(1_500)), 2);
        assert_eq!(ceil_secs(Duration::ZERO), 1);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_limit(
            max in 1u32..20,
            offsets in proptest::collection::vec(0u64..30_000, 1..100)
        ) {
            let limiter = FixedWindowLimiter::new(max, secs(10));
            let t0 = Instant::now();
            let mut offsets = offsets;
            offsets.sort_unstable();

            let mut allowed_per_window = std::collections::HashMap::<Instant, u32>::new();
            for offset in offsets {
                let now = t0 + Duration::from_millis(offset);
                if limiter.check_at(0u8, now).is_ok() {
                    let started = limiter.windows.get(&0u8).map(|w| w.started).unwrap();
                    *allowed_per_window.entry(started).or_default() += 1;
                }
            }

            prop_assert!(allowed_per_window.values().all(|&n| n <= max));
        }
    }
}
