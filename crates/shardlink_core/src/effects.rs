//! # Item Effects
//!
//! Maps an opaque item identifier to a bounded state mutation.
//!
//! ```text
//!   item_id ──> ItemRangeTable::classify ──> ItemEffect ──> ReceiverState
//!                  (sorted, disjoint)          │
//!                                              ├─ IncrementCounter(id)  saturating
//!                                              └─ SetMilestone(bit)     idempotent
//! ```
//!
//! Dispatch is total. An identifier outside every range touches nothing, so
//! a receiver keeps working when the sender starts using identifiers it was
//! not built with.

use tracing::{debug, info};

use crate::counters::{CounterId, CounterStep};
use crate::error::{LinkError, LinkResult};
use crate::progress::MAX_MILESTONES;
use crate::state::ReceiverState;

/// What an identifier range does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectClass {
    /// Every identifier in the range increments one counter.
    Counter(CounterId),
    /// Identifier `start + i` sets milestone `first_bit + i`.
    Milestones {
        /// Milestone index for the first identifier of the range.
        first_bit: usize,
    },
}

/// A contiguous block of reserved identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemRange {
    /// First identifier in the range.
    pub start: u32,
    /// Number of identifiers. Never zero.
    pub len: u32,
    /// Effect of identifiers in this range.
    pub class: EffectClass,
}

impl ItemRange {
    /// A single identifier that bumps `counter`.
    #[must_use]
    pub const fn counter(item_id: u32, counter: CounterId) -> Self {
        Self {
            start: item_id,
            len: 1,
            class: EffectClass::Counter(counter),
        }
    }

    /// `len` identifiers starting at `start`, mapped onto milestones
    /// `first_bit..first_bit + len`.
    #[must_use]
    pub const fn milestones(start: u32, len: u32, first_bit: usize) -> Self {
        Self {
            start,
            len,
            class: EffectClass::Milestones { first_bit },
        }
    }

    /// Last identifier in the range, or `None` if the range is empty or runs
    /// past `u32::MAX`.
    #[must_use]
    pub fn last(&self) -> Option<u32> {
        self.len.checked_sub(1).and_then(|n| self.start.checked_add(n))
    }

    /// True if `item_id` falls in the range.
    #[inline]
    #[must_use]
    pub fn contains(&self, item_id: u32) -> bool {
        item_id
            .checked_sub(self.start)
            .is_some_and(|offset| offset < self.len)
    }
}

/// Effect selected for one identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemEffect {
    /// Increment the counter.
    IncrementCounter(CounterId),
    /// Set the milestone bit.
    SetMilestone(usize),
}

/// Sorted, non-overlapping identifier ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemRangeTable {
    ranges: Vec<ItemRange>,
}

impl ItemRangeTable {
    /// Creates an empty table. Every identifier is unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a range.
    ///
    /// # Errors
    ///
    /// Rejects empty ranges, ranges that run past `u32::MAX`, milestone
    /// ranges whose bits do not fit in [`MAX_MILESTONES`], and ranges that
    /// overlap one already in the table.
    pub fn insert(&mut self, range: ItemRange) -> LinkResult<()> {
        let end = range.last().ok_or_else(|| {
            LinkError::InvalidConfig(format!(
                "item range at {} with length {} is empty or overflows",
                range.start, range.len
            ))
        })?;
        if let EffectClass::Milestones { first_bit } = range.class {
            let fits = first_bit
                .checked_add(range.len as usize)
                .is_some_and(|bits_end| bits_end <= MAX_MILESTONES);
            if !fits {
                return Err(LinkError::InvalidConfig(format!(
                    "milestone range at {} maps {} items from bit {first_bit}, past bit {}",
                    range.start,
                    range.len,
                    MAX_MILESTONES - 1
                )));
            }
        }

        let at = self.ranges.partition_point(|r| r.start < range.start);
        let neighbours = [at.checked_sub(1), Some(at)];
        for other in neighbours.into_iter().flatten().filter_map(|i| self.ranges.get(i)) {
            let other_end = other.last().unwrap_or(other.start);
            if range.start <= other_end && other.start <= end {
                return Err(LinkError::OverlappingRanges {
                    start: range.start,
                    end,
                    other_start: other.start,
                    other_end,
                });
            }
        }

        self.ranges.insert(at, range);
        Ok(())
    }

    /// Finds the effect for `item_id`. `None` means unknown.
    #[must_use]
    pub fn classify(&self, item_id: u32) -> Option<ItemEffect> {
        let at = self.ranges.partition_point(|r| r.start <= item_id);
        let range = self.ranges.get(at.checked_sub(1)?)?;
        if !range.contains(item_id) {
            return None;
        }
        Some(match range.class {
            EffectClass::Counter(counter) => ItemEffect::IncrementCounter(counter),
            EffectClass::Milestones { first_bit } => {
                ItemEffect::SetMilestone(first_bit.checked_add((item_id - range.start) as usize)?)
            }
        })
    }

    /// Ranges in ascending order.
    #[must_use]
    pub fn ranges(&self) -> &[ItemRange] {
        &self.ranges
    }
}

/// What [`ItemEffectApplier::apply`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Identifier is outside every range. Nothing changed.
    Ignored,
    /// Counter went up; carries the new value.
    CounterIncremented {
        /// Counter that changed.
        counter: CounterId,
        /// Value after the increment.
        value: u32,
    },
    /// Counter was already at its maximum.
    CounterSaturated {
        /// Counter that was targeted.
        counter: CounterId,
        /// Unchanged value.
        value: u32,
    },
    /// Milestone went from unset to set.
    MilestoneReached(usize),
    /// Milestone was already set (or outside the tracker). Nothing changed.
    MilestoneUnchanged(usize),
}

impl ApplyOutcome {
    /// True if the receiver state was modified.
    #[must_use]
    pub const fn changed_state(&self) -> bool {
        matches!(
            self,
            Self::CounterIncremented { .. } | Self::MilestoneReached(_)
        )
    }
}

/// Receiver-side dispatch from identifier to effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemEffectApplier {
    table: ItemRangeTable,
}

impl ItemEffectApplier {
    /// Creates an applier over `table`.
    #[must_use]
    pub fn new(table: ItemRangeTable) -> Self {
        Self { table }
    }

    /// The range table.
    #[must_use]
    pub fn table(&self) -> &ItemRangeTable {
        &self.table
    }

    /// Applies the effect of `item_id` to `state`.
    ///
    /// Total: unknown identifiers, saturated counters and already-set
    /// milestones all leave `state` untouched.
    pub fn apply(&self, item_id: u32, state: &mut ReceiverState) -> ApplyOutcome {
        match self.table.classify(item_id) {
            None => {
                debug!(item_id, "unknown item id, ignored");
                ApplyOutcome::Ignored
            }
            Some(ItemEffect::IncrementCounter(counter)) => match state.counters.increment(counter) {
                Some(CounterStep::Incremented(value)) => {
                    debug!(item_id, counter = counter.index(), value, "counter incremented");
                    ApplyOutcome::CounterIncremented { counter, value }
                }
                Some(CounterStep::Saturated(value)) => {
                    debug!(item_id, counter = counter.index(), value, "counter saturated");
                    ApplyOutcome::CounterSaturated { counter, value }
                }
                // The table refers to a counter this state does not have.
                None => ApplyOutcome::Ignored,
            },
            Some(ItemEffect::SetMilestone(bit)) => {
                if state.progress.mark_reached(bit) {
                    info!(item_id, milestone = bit, "milestone reached");
                    ApplyOutcome::MilestoneReached(bit)
                } else {
                    ApplyOutcome::MilestoneUnchanged(bit)
                }
            }
        }
    }
}
