//! Last-writer-wins reconciliation of pushed snapshots
//!
//! Timestamps are compared as epoch milliseconds. A remote snapshot replaces
//! local state only when strictly newer; concurrent field-level edits are not
//! merged.

use chrono::{DateTime, Utc};
use studio_core::MissingTimestampPolicy;

/// Outcome of comparing a remote snapshot with local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Replace local state wholesale
    ApplyRemote,
    /// Discard the remote snapshot
    KeepLocal,
}

/// Timestamp comparison with an explicit missing-timestamp policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: MissingTimestampPolicy,
}

impl ConflictResolver {
    /// Create resolver with policy
    #[inline]
    #[must_use]
    pub fn new(policy: MissingTimestampPolicy) -> Self {
        Self { policy }
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> MissingTimestampPolicy {
        self.policy
    }

    /// Decide whether a remote snapshot replaces local state
    #[must_use]
    pub fn resolve(
        &self,
        local: Option<DateTime<Utc>>,
        remote: Option<DateTime<Utc>>,
    ) -> Resolution {
        let local = local.map(|ts| ts.timestamp_millis());
        let remote = remote.map(|ts| ts.timestamp_millis());

        let apply = match (self.policy, local, remote) {
            (_, Some(local), Some(remote)) => remote > local,
            (MissingTimestampPolicy::AlwaysApply, _, _) => true,
            (MissingTimestampPolicy::TreatAsStale, None, Some(_)) => true,
            (MissingTimestampPolicy::TreatAsStale, _, None) => false,
            (MissingTimestampPolicy::TreatAsEpoch, local, remote) => {
                remote.unwrap_or(0) > local.unwrap_or(0)
            }
        };

        if apply {
            Resolution::ApplyRemote
        } else {
            Resolution::KeepLocal
        }
    }

    /// Decide whether the store's answer to our own write replaces local state
    ///
    /// Equal timestamps are accepted: the echo of our own write may already
    /// have arrived through the change feed. Only a response older than what
    /// is already shown is refused.
    #[must_use]
    pub fn accepts_response(
        &self,
        local: Option<DateTime<Utc>>,
        response: Option<DateTime<Utc>>,
    ) -> bool {
        match (local, response) {
            (Some(local), Some(response)) => {
                response.timestamp_millis() >= local.timestamp_millis()
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms).single()
    }

    #[test]
    fn strictly_newer_applies() {
        let resolver = ConflictResolver::default();
        assert_eq!(resolver.resolve(at(1_000), at(1_001)), Resolution::ApplyRemote);
        assert_eq!(resolver.resolve(at(1_000), at(1_000)), Resolution::KeepLocal);
        assert_eq!(resolver.resolve(at(1_000), at(999)), Resolution::KeepLocal);
    }

    #[test]
    fn sub_millisecond_difference_is_equal() {
        let resolver = ConflictResolver::default();
        let local = Utc.timestamp_opt(10, 1_000_000).single();
        let remote = Utc.timestamp_opt(10, 1_500_000).single();
        assert_eq!(resolver.resolve(local, remote), Resolution::KeepLocal);
    }

    #[test]
    fn treat_as_stale_policy() {
        let resolver = ConflictResolver::new(MissingTimestampPolicy::TreatAsStale);
        assert_eq!(resolver.resolve(at(5), None), Resolution::KeepLocal);
        assert_eq!(resolver.resolve(None, None), Resolution::KeepLocal);
        assert_eq!(resolver.resolve(None, at(5)), Resolution::ApplyRemote);
    }

    #[test]
    fn treat_as_epoch_policy() {
        let resolver = ConflictResolver::new(MissingTimestampPolicy::TreatAsEpoch);
        assert_eq!(resolver.resolve(None, at(5)), Resolution::ApplyRemote);
        assert_eq!(resolver.resolve(at(5), None), Resolution::KeepLocal);
        assert_eq!(resolver.resolve(None, None), Resolution::KeepLocal);
    }

    #[test]
    fn always_apply_policy() {
        let resolver = ConflictResolver::new(MissingTimestampPolicy::AlwaysApply);
        assert_eq!(resolver.resolve(at(5), None), Resolution::ApplyRemote);
        assert_eq!(resolver.resolve(None, None), Resolution::ApplyRemote);
        assert_eq!(resolver.resolve(at(5), at(4)), Resolution::KeepLocal);
    }

    #[test]
    fn responses_only_refused_when_older() {
        let resolver = ConflictResolver::default();
        assert!(resolver.accepts_response(at(10), at(10)));
        assert!(resolver.accepts_response(at(10), at(11)));
        assert!(!resolver.accepts_response(at(10), at(9)));
        assert!(resolver.accepts_response(None, None));
    }

    proptest! {
        #[test]
        fn prop_never_regresses(local in 0i64..1_000_000, remote in 0i64..1_000_000) {
            for policy in [
                MissingTimestampPolicy::TreatAsStale,
                MissingTimestampPolicy::TreatAsEpoch,
                MissingTimestampPolicy::AlwaysApply,
            ] {
                let resolution = ConflictResolver::new(policy).resolve(at(local), at(remote));
                prop_assert_eq!(resolution == Resolution::ApplyRemote, remote > local);
            }
        }
    }
}
