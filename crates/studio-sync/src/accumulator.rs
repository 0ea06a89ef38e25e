//! Pending-edit accumulator
//!
//! Successive partial updates collapse into one patch with a shallow union:
//! distinct top-level fields all survive, the same field keeps its latest
//! value. Nested arrays (`tiers`) are replaced whole.

use studio_core::ProfilePatch;

/// Edits waiting for the next flush
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    patch: ProfilePatch,
    edits: usize,
}

impl Accumulator {
    /// Create empty accumulator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a newer edit on top of the pending patch
    pub fn push(&mut self, patch: ProfilePatch) {
        self.patch.merge(patch);
        self.edits += 1;
    }

    /// Merge an older patch underneath the pending one
    ///
    /// Used to carry a failed write forward: its fields are re-sent unless a
    /// newer edit overwrote them.
    pub fn push_beneath(&mut self, earlier: ProfilePatch) {
        let later = std::mem::take(&mut self.patch);
        self.patch = earlier.merged(later);
    }

    /// Check if nothing is pending
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
    }

    /// Number of edits merged since the last take
    #[inline]
    #[must_use]
    pub fn edits(&self) -> usize {
        self.edits
    }

    /// Current accumulated patch
    #[inline]
    #[must_use]
    pub fn peek(&self) -> &ProfilePatch {
        &self.patch
    }

    /// Drain the accumulated patch, `None` when empty
    pub fn take(&mut self) -> Option<ProfilePatch> {
        if self.patch.is_empty() {
            return None;
        }
        self.edits = 0;
        Some(std::mem::take(&mut self.patch))
    }
}
