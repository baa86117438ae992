//! # Link Configuration
//!
//! The identifier base and the reserved sub-ranges are an allocation
//! contract shared with the sender, so they live in a config file rather
//! than in the binary.
//!
//! ```toml
//! item_base = 3860000
//! milestone_offset = 1
//! milestone_count = 8
//! location_offset = 100000
//! tick_interval_ms = 16
//!
//! [[counters]]
//! name = "extra_lives"
//! offset = 9
//! max = 255
//! initial = 0
//! ```
//!
//! Every identifier is `item_base + offset`. With the defaults, milestone
//! `i` is item `item_base + 1 + i` and the extra-life item is
//! `item_base + 9`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::counters::{BoundedCounter, CounterBank};
use crate::effects::{ItemEffectApplier, ItemRange, ItemRangeTable};
use crate::error::{LinkError, LinkResult};
use crate::progress::{ProgressTracker, MAX_MILESTONES, MILESTONE_COUNT};
use crate::state::ReceiverState;

/// Default identifier base.
pub const DEFAULT_ITEM_BASE: u32 = 3_860_000;

/// One counter-class item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterConfig {
    /// Counter name.
    pub name: String,
    /// Item identifier offset from `item_base`.
    pub offset: u32,
    /// Saturation point.
    pub max: u32,
    /// Value at startup.
    #[serde(default)]
    pub initial: u32,
}

impl CounterConfig {
    /// Creates a counter config starting at zero.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: u32, max: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            max,
            initial: 0,
        }
    }

    /// Sets the startup value.
    #[must_use]
    pub fn with_initial(mut self, initial: u32) -> Self {
        self.initial = initial;
        self
    }
}

/// Link configuration shared by receiver and sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Base of the reserved identifier space.
    pub item_base: u32,
    /// Offset of the first milestone item from `item_base`.
    pub milestone_offset: u32,
    /// Number of milestones (width of the milestone range).
    pub milestone_count: u32,
    /// Offset of the first location id from `item_base`, used by the sender
    /// to name reached milestones.
    pub location_offset: u32,
    /// Receiver tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Counter-class items. Kept last so it serializes as trailing
    /// `[[counters]]` tables.
    pub counters: Vec<CounterConfig>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            item_base: DEFAULT_ITEM_BASE,
            milestone_offset: 1,
            milestone_count: MILESTONE_COUNT as u32,
            location_offset: 100_000,
            tick_interval_ms: 16,
            counters: vec![CounterConfig::new("extra_lives", 9, 255)],
        }
    }
}

impl LinkConfig {
    /// Parses TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML, unknown keys, or values that do
    /// not validate.
    pub fn from_toml_str(text: &str) -> LinkResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not validate.
    pub fn load(path: impl AsRef<Path>) -> LinkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| LinkError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> LinkResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Sets the identifier base.
    #[must_use]
    pub fn with_item_base(mut self, item_base: u32) -> Self {
        self.item_base = item_base;
        self
    }

    /// Sets the tick period.
    #[must_use]
    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    /// Adds a counter-class item.
    #[must_use]
    pub fn with_counter(mut self, counter: CounterConfig) -> Self {
        self.counters.push(counter);
        self
    }

    /// Tick period as a `Duration`.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    fn absolute(&self, what: &str, offset: u32) -> LinkResult<u32> {
        self.item_base.checked_add(offset).ok_or_else(|| {
            LinkError::InvalidConfig(format!(
                "{what}: item_base {} + offset {offset} overflows u32",
                self.item_base
            ))
        })
    }

    /// First identifier of the milestone range.
    ///
    /// # Errors
    ///
    /// Returns an error if `item_base + milestone_offset` overflows.
    pub fn milestone_range_start(&self) -> LinkResult<u32> {
        self.absolute("milestone range", self.milestone_offset)
    }

    /// Identifier that sets milestone `index`, if the index is in range.
    #[must_use]
    pub fn milestone_item_id(&self, index: u32) -> Option<u32> {
        if index >= self.milestone_count {
            return None;
        }
        self.milestone_range_start().ok()?.checked_add(index)
    }

    /// Identifier of the named counter item.
    #[must_use]
    pub fn counter_item_id(&self, name: &str) -> Option<u32> {
        let counter = self.counters.iter().find(|c| c.name == name)?;
        self.item_base.checked_add(counter.offset)
    }

    /// Location identifier reported when milestone `bit` is reached.
    #[must_use]
    pub fn location_id(&self, bit: u32) -> Option<u32> {
        self.item_base
            .checked_add(self.location_offset)?
            .checked_add(bit)
    }

    /// Checks value ranges and builds the range table once to catch
    /// overlaps.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> LinkResult<()> {
        self.build_receiver().map(|_| ())
    }

    fn check_shape(&self) -> LinkResult<()> {
        if self.milestone_count == 0 || self.milestone_count as usize > MAX_MILESTONES {
            return Err(LinkError::InvalidConfig(format!(
                "milestone_count must be in 1..={MAX_MILESTONES}, got {}",
                self.milestone_count
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(LinkError::InvalidConfig(
                "tick_interval_ms must be non-zero".to_string(),
            ));
        }
        self.location_id(self.milestone_count - 1).ok_or_else(|| {
            LinkError::InvalidConfig("location ids overflow u32".to_string())
        })?;
        Ok(())
    }

    /// Builds the counter bank at its startup values.
    ///
    /// Counters are registered in declaration order, so the ids match the
    /// ones [`Self::range_table`] dispatches to.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero maximum, an initial value above the
    /// maximum, or a duplicate name.
    pub fn counter_bank(&self) -> LinkResult<CounterBank> {
        let mut counters = CounterBank::new();
        for counter in &self.counters {
            if counter.max == 0 {
                return Err(LinkError::InvalidConfig(format!(
                    "counter '{}' has zero maximum",
                    counter.name
                )));
            }
            if counter.initial > counter.max {
                return Err(LinkError::InvalidConfig(format!(
                    "counter '{}' starts at {} above its maximum {}",
                    counter.name, counter.initial, counter.max
                )));
            }
            counters.register(BoundedCounter::new(
                counter.name.clone(),
                counter.max,
                counter.initial,
            ))?;
        }
        Ok(counters)
    }

    /// Builds the item range table.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape is invalid, an identifier overflows,
    /// or two ranges overlap.
    pub fn range_table(&self) -> LinkResult<ItemRangeTable> {
        self.check_shape()?;
        let bank = self.counter_bank()?;

        let mut table = ItemRangeTable::new();
        table.insert(ItemRange::milestones(
            self.milestone_range_start()?,
            self.milestone_count,
            0,
        ))?;
        for ((id, _), counter) in bank.iter().zip(&self.counters) {
            let item_id = self.absolute(&counter.name, counter.offset)?;
            table.insert(ItemRange::counter(item_id, id))?;
        }
        Ok(table)
    }

    /// Builds the range table and the initial receiver state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is inconsistent.
    pub fn build_receiver(&self) -> LinkResult<(ItemEffectApplier, ReceiverState)> {
        let table = self.range_table()?;
        let progress = ProgressTracker::with_cardinality(self.milestone_count as usize);
        Ok((
            ItemEffectApplier::new(table),
            ReceiverState::new(progress, self.counter_bank()?),
        ))
    }
}
