//! Receiver-side game state touched by item effects and milestone triggers.

use crate::counters::CounterBank;
use crate::progress::ProgressTracker;

/// Everything the item applier is allowed to mutate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceiverState {
    /// Milestone bit-vector.
    pub progress: ProgressTracker,
    /// Bounded counters.
    pub counters: CounterBank,
}

impl ReceiverState {
    /// Creates state from its parts.
    #[must_use]
    pub fn new(progress: ProgressTracker, counters: CounterBank) -> Self {
        Self { progress, counters }
    }
}
