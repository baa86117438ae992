//! # Bounded Counters
//!
//! Counter-like receiver state (extra lives and friends). Increments clamp at
//! the declared maximum; nothing ever wraps.

use crate::error::{LinkError, LinkResult};

/// Index of a counter inside a [`CounterBank`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CounterId(u16);

impl CounterId {
    /// Position of the counter in its bank.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Result of a single increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterStep {
    /// Value went up by one.
    Incremented(u32),
    /// Value was already at its maximum and did not change.
    Saturated(u32),
}

/// A named counter in `0..=max`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundedCounter {
    name: String,
    value: u32,
    max: u32,
}

impl BoundedCounter {
    /// Creates a counter. `initial` is clamped to `max`.
    #[must_use]
    pub fn new(name: impl Into<String>, max: u32, initial: u32) -> Self {
        Self {
            name: name.into(),
            value: initial.min(max),
            max,
        }
    }

    /// Counter name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Declared maximum.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Adds one, saturating at the maximum.
    pub fn increment(&mut self) -> CounterStep {
        if self.value >= self.max {
            CounterStep::Saturated(self.value)
        } else {
            self.value += 1;
            CounterStep::Incremented(self.value)
        }
    }

    /// Overwrites the value, clamped to the maximum. For game logic that
    /// spends or restores the counter.
    pub fn set(&mut self, value: u32) {
        self.value = value.min(self.max);
    }
}

/// Fixed set of counters registered at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CounterBank {
    counters: Vec<BoundedCounter>,
}

impl CounterBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a counter and returns its id.
    ///
    /// # Errors
    ///
    /// Fails once `u16::MAX` counters are registered or if the name is
    /// already taken.
    pub fn register(&mut self, counter: BoundedCounter) -> LinkResult<CounterId> {
        if self.find(counter.name()).is_some() {
            return Err(LinkError::InvalidConfig(format!(
                "duplicate counter name '{}'",
                counter.name()
            )));
        }
        let id = u16::try_from(self.counters.len())
            .map_err(|_| LinkError::InvalidConfig("too many counters".to_string()))?;
        self.counters.push(counter);
        Ok(CounterId(id))
    }

    /// Looks up a counter by id.
    #[inline]
    #[must_use]
    pub fn get(&self, id: CounterId) -> Option<&BoundedCounter> {
        self.counters.get(id.index())
    }

    /// Mutable lookup by id.
    #[inline]
    pub fn get_mut(&mut self, id: CounterId) -> Option<&mut BoundedCounter> {
        self.counters.get_mut(id.index())
    }

    /// Finds a counter by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<CounterId> {
        self.counters
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(CounterId)
    }

    /// Current value of a counter.
    #[inline]
    #[must_use]
    pub fn value(&self, id: CounterId) -> Option<u32> {
        self.get(id).map(BoundedCounter::value)
    }

    /// Increments a counter. `None` for an unknown id.
    pub fn increment(&mut self, id: CounterId) -> Option<CounterStep> {
        self.get_mut(id).map(BoundedCounter::increment)
    }

    /// Number of counters.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// True if no counter is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Iterates counters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (CounterId, &BoundedCounter)> {
        self.counters
            .iter()
            .enumerate()
            .filter_map(|(i, c)| u16::try_from(i).ok().map(|i| (CounterId(i), c)))
    }
}
