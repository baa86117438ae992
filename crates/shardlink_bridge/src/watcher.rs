//! # Progress Watcher
//!
//! Turns the receiver's progress mirror into location checks for the
//! controller. The mirror is read as-is; the watcher keeps its own union of
//! every bit it has seen, so a mirror that regresses (a receiver restart,
//! say) never un-checks anything.
//!
//! The first observation is a baseline. Bits already set when the watcher
//! attaches are assumed reported by an earlier session.

use tracing::{info, warn};

use shardlink_core::{LinkConfig, LinkError, ProgressMask, MAX_MILESTONES};

use crate::error::BridgeResult;

/// Milestone bit to location identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationMap {
    locations: [Option<u32>; MAX_MILESTONES],
}

impl LocationMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps every configured milestone to `item_base + location_offset + bit`.
    ///
    /// # Errors
    ///
    /// Returns an error if a location identifier overflows.
    pub fn from_config(config: &LinkConfig) -> BridgeResult<Self> {
        let mut map = Self::new();
        for bit in 0..config.milestone_count.min(MAX_MILESTONES as u32) {
            let location_id = config.location_id(bit).ok_or_else(|| {
                LinkError::InvalidConfig(format!("location id for milestone {bit} overflows u32"))
            })?;
            map.insert(bit as usize, location_id);
        }
        Ok(map)
    }

    /// Maps `bit` to `location_id`. The first mapping for a bit wins.
    ///
    /// Returns `false` if the bit is out of range or already mapped.
    pub fn insert(&mut self, bit: usize, location_id: u32) -> bool {
        match self.locations.get_mut(bit) {
            Some(slot @ None) => {
                *slot = Some(location_id);
                true
            }
            _ => false,
        }
    }

    /// Location for `bit`, if mapped.
    #[must_use]
    pub fn location_for(&self, bit: usize) -> Option<u32> {
        self.locations.get(bit).copied().flatten()
    }

    /// Number of mapped bits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.iter().filter(|l| l.is_some()).count()
    }

    /// True if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A milestone the sender should report as checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LocationCheck {
    /// Milestone bit index.
    pub bit: usize,
    /// Location identifier reported upstream.
    pub location_id: u32,
}

/// Watches the progress mirror for newly reached milestones.
#[derive(Clone, Debug)]
pub struct ProgressWatcher {
    locations: LocationMap,
    checked: Option<ProgressMask>,
}

impl ProgressWatcher {
    /// Creates a watcher that has not seen the mirror yet.
    #[must_use]
    pub fn new(locations: LocationMap) -> Self {
        Self {
            locations,
            checked: None,
        }
    }

    /// Feeds one mirror reading. Returns the checks for bits not seen
    /// before, in ascending bit order.
    pub fn observe(&mut self, mirror: ProgressMask) -> Vec<LocationCheck> {
        let Some(checked) = self.checked else {
            info!(bits = mirror.bits(), "progress baseline");
            self.checked = Some(mirror);
            return Vec::new();
        };

        let cleared = mirror.cleared_since(checked);
        if !cleared.is_empty() {
            warn!(
                cleared = cleared.bits(),
                mirror = mirror.bits(),
                "progress mirror regressed, keeping checked bits"
            );
        }

        let fresh = mirror.newly_set_since(checked);
        self.checked = Some(checked.union(mirror));

        fresh
            .iter()
            .filter_map(|bit| {
                let Some(location_id) = self.locations.location_for(bit) else {
                    warn!(bit, "milestone has no location");
                    return None;
                };
                info!(bit, location_id, "location checked");
                Some(LocationCheck { bit, location_id })
            })
            .collect()
    }

    /// Every bit seen so far, or `None` before the first observation.
    #[must_use]
    pub fn checked(&self) -> Option<ProgressMask> {
        self.checked
    }

    /// True once the baseline has been taken.
    #[must_use]
    pub fn has_baseline(&self) -> bool {
        self.checked.is_some()
    }

    /// The bit-to-location map.
    #[must_use]
    pub fn locations(&self) -> &LocationMap {
        &self.locations
    }
}
