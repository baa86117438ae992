//! # Progress Tracking
//!
//! Milestones are one-way switches. Once a bit is set it stays set for the
//! life of the run; nothing in this module can clear one.

use tracing::warn;

/// Default number of milestones.
pub const MILESTONE_COUNT: usize = 8;

/// Upper bound on milestones: the mirror is a single 32-bit word.
pub const MAX_MILESTONES: usize = 32;

/// A set of milestone indices packed into one word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProgressMask(u32);

impl ProgressMask {
    /// No milestones.
    pub const EMPTY: Self = Self(0);

    /// Wraps raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Checks whether milestone `index` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, index: usize) -> bool {
        index < MAX_MILESTONES && (self.0 >> index) & 1 == 1
    }

    /// Returns the set with `index` added. Out-of-range indices are ignored.
    #[inline]
    #[must_use]
    pub const fn with(self, index: usize) -> Self {
        if index < MAX_MILESTONES {
            Self(self.0 | (1 << index))
        } else {
            self
        }
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Milestones present in `self` but not in `previous`.
    #[inline]
    #[must_use]
    pub const fn newly_set_since(self, previous: Self) -> Self {
        Self(self.0 & !previous.0)
    }

    /// Milestones present in `previous` but missing from `self`.
    #[inline]
    #[must_use]
    pub const fn cleared_since(self, previous: Self) -> Self {
        Self(previous.0 & !self.0)
    }

    /// True if no milestone is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of milestones set.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates set indices in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_MILESTONES).filter(move |&index| self.contains(index))
    }
}

/// Receiver-side record of which milestones have been reached.
///
/// Game logic calls [`Self::mark_reached`]; the poll loop publishes
/// [`Self::snapshot`] into the shared mirror.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressTracker {
    reached: ProgressMask,
    cardinality: usize,
}

impl ProgressTracker {
    /// Creates a tracker with the default [`MILESTONE_COUNT`] milestones.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cardinality(MILESTONE_COUNT)
    }

    /// Creates a tracker for `cardinality` milestones, clamped to
    /// [`MAX_MILESTONES`].
    #[must_use]
    pub fn with_cardinality(cardinality: usize) -> Self {
        Self {
            reached: ProgressMask::EMPTY,
            cardinality: cardinality.min(MAX_MILESTONES),
        }
    }

    /// Number of milestones this tracker knows about.
    #[inline]
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    /// Records that milestone `index` was reached.
    ///
    /// Returns `true` only on the 0 -> 1 transition. Re-marking a reached
    /// milestone and marking an index past the cardinality are no-ops.
    pub fn mark_reached(&mut self, index: usize) -> bool {
        if index >= self.cardinality {
            warn!(index, cardinality = self.cardinality, "milestone index out of range, ignored");
            return false;
        }
        if self.reached.contains(index) {
            return false;
        }
        self.reached = self.reached.with(index);
        true
    }

    /// Checks whether milestone `index` has been reached.
    #[inline]
    #[must_use]
    pub fn is_reached(&self, index: usize) -> bool {
        index < self.cardinality && self.reached.contains(index)
    }

    /// Current set of reached milestones.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> ProgressMask {
        self.reached
    }

    /// True once every milestone has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.reached.count() as usize == self.cardinality
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
