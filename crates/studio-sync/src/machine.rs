//! Flush state machine
//!
//! ```text
//!            apply                 timer_fired / flush_now
//!   Idle ───────────▶ Pending ─────────────────────────▶ Flushing
//!    ▲                 │  ▲ apply (restart deadline)        │
//!    │                 └──┘                                 │
//!    │   flush_succeeded / flush_failed, nothing queued     │
//!    ├──────────────────────────────────────────────────────┤
//!    │                                                      │
//!    └──── Pending ◀── flush_succeeded / flush_failed, edits queued
//! ```
//!
//! At most one write is in flight. Edits arriving during `Flushing` are
//! queued and timer expiries are ignored until the write completes.
//!
//! The machine is pure: callers pass the current instant and execute the
//! returned [`FlushRequest`] themselves.

use crate::accumulator::Accumulator;
use std::time::Duration;
use studio_core::{FlushRequest, MutationId, ProfileId, ProfilePatch};
use tokio::time::Instant;

/// Machine phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Nothing scheduled
    Idle,
    /// Edits waiting for the debounce deadline
    Pending {
        /// When the accumulated edits are written
        deadline: Instant,
    },
    /// One write in flight
    Flushing {
        /// The write awaiting its response
        request: FlushRequest,
    },
}

/// What a completed write leaves behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled {
    /// Result did not match the in-flight write
    Ignored,
    /// Nothing else pending
    Clean,
    /// Edits arrived during the write and are scheduled next
    Queued(ProfilePatch),
}

/// Debounce and flush bookkeeping for one record
#[derive(Debug, Clone)]
pub struct FlushMachine {
    profile_id: ProfileId,
    debounce: Duration,
    phase: Phase,
    pending: Accumulator,
    carried: Option<FlushRequest>,
}

impl FlushMachine {
    /// Create idle machine
    #[inline]
    #[must_use]
    pub fn new(profile_id: ProfileId, debounce: Duration) -> Self {
        Self {
            profile_id,
            debounce,
            phase: Phase::Idle,
            pending: Accumulator::new(),
            carried: None,
        }
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Debounce deadline, if one is armed
    #[inline]
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Write currently in flight
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> Option<&FlushRequest> {
        match &self.phase {
            Phase::Flushing { request } => Some(request),
            _ => None,
        }
    }

    /// Edits not yet handed to a write
    #[inline]
    #[must_use]
    pub fn pending(&self) -> &ProfilePatch {
        self.pending.peek()
    }

    /// Patch of the last failed write, kept until the next edit or flush
    #[inline]
    #[must_use]
    pub fn carried(&self) -> Option<&FlushRequest> {
        self.carried.as_ref()
    }

    /// Check if any edit has not been confirmed by the store
    #[inline]
    #[must_use]
    pub fn has_unsaved(&self) -> bool {
        !self.pending.is_empty() || self.carried.is_some() || self.in_flight().is_some()
    }

    /// Accumulate an edit and restart the debounce deadline
    ///
    /// An empty patch is ignored unless a carried failed write is waiting,
    /// in which case that write is rescheduled.
    pub fn apply(&mut self, patch: ProfilePatch, now: Instant) {
        if patch.is_empty() && self.carried.is_none() {
            return;
        }
        if let Some(carried) = self.carried.take() {
            self.pending.push_beneath(carried.patch);
        }
        self.pending.push(patch);

        if !matches!(self.phase, Phase::Flushing { .. }) {
            self.phase = Phase::Pending {
                deadline: now + self.debounce,
            };
        }
    }

    /// Timer expiry; starts a write when the deadline has passed
    pub fn timer_fired(&mut self, now: Instant) -> Option<FlushRequest> {
        match self.phase {
            Phase::Pending { deadline } if now >= deadline => self.start_flush(),
            _ => None,
        }
    }

    /// Write pending edits without waiting for the deadline
    ///
    /// From `Idle` this re-sends a carried failed write under its original
    /// mutation id. Ignored while a write is in flight.
    pub fn flush_now(&mut self) -> Option<FlushRequest> {
        match self.phase {
            Phase::Pending { .. } => self.start_flush(),
            Phase::Idle => {
                let retry = self.carried.take()?;
                let request = FlushRequest::new(self.profile_id, retry.patch)
                    .with_mutation_id(retry.mutation_id);
                self.phase = Phase::Flushing {
                    request: request.clone(),
                };
                Some(request)
            }
            Phase::Flushing { .. } => None,
        }
    }

    /// Store confirmed the in-flight write
    pub fn flush_succeeded(&mut self, mutation_id: MutationId, now: Instant) -> Settled {
        if !self.is_in_flight(mutation_id) {
            return Settled::Ignored;
        }

        self.reschedule(now);
        if self.pending.is_empty() {
            Settled::Clean
        } else {
            Settled::Queued(self.pending.peek().clone())
        }
    }

    /// Store rejected the in-flight write; returns false for stray results
    ///
    /// The failed patch is never re-sent on its own. It rides along with
    /// queued edits if there are any, otherwise it waits for the next edit.
    pub fn flush_failed(&mut self, mutation_id: MutationId, now: Instant) -> bool {
        if !self.is_in_flight(mutation_id) {
            return false;
        }

        let Phase::Flushing { request } = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return false;
        };

        if self.pending.is_empty() {
            self.carried = Some(request);
        } else {
            self.pending.push_beneath(request.patch);
        }

        self.reschedule(now);
        true
    }

    fn is_in_flight(&self, mutation_id: MutationId) -> bool {
        self.in_flight()
            .is_some_and(|request| request.mutation_id == mutation_id)
    }

    fn start_flush(&mut self) -> Option<FlushRequest> {
        match self.pending.take() {
            Some(patch) => {
                let request = FlushRequest::new(self.profile_id, patch);
                self.phase = Phase::Flushing {
                    request: request.clone(),
                };
                Some(request)
            }
            None => {
                self.phase = Phase::Idle;
                None
            }
        }
    }

    fn reschedule(&mut self, now: Instant) {
        self.phase = if self.pending.is_empty() {
            Phase::Idle
        } else {
            Phase::Pending {
                deadline: now + self.debounce,
            }
        };
    }
}
