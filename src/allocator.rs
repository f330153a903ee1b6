//! Channel to slot allocation.
//!
//! [`allocate`] maps a requested [`ChannelSet`] onto the ordered slots of a
//! capacity-limited sequencer:
//!
//! - channels are assigned lowest id first, one per slot, starting at slot 0
//! - the last assigned slot is marked terminal
//! - when more channels are requested than the sequencer holds, the
//!   highest-numbered ones are dropped rather than rejected
//!
//! Allocation is a pure function of its arguments.
//!
//! # Example
//!
//! ```
//! use daq_driver_sequencer::{allocate, ChannelSet, SequencerCapacity};
//!
//! # fn example() -> anyhow::Result<()> {
//! let requested = ChannelSet::from_channels(12, &[1, 4, 9])?;
//! let plan = allocate(SequencerCapacity::new(4)?, requested)?;
//!
//! assert_eq!(plan.len(), 3);
//! assert_eq!(plan.terminal().channel, 9);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use tracing::debug;

use crate::channel_set::ChannelSet;
use crate::error::{AllocationError, ConfigurationError};
use crate::hardware::SequencerId;

/// Slot counts of the four sequencers in each ADC module, indexed by sequencer number.
pub const REFERENCE_CAPACITIES: [u8; 4] = [8, 4, 4, 1];

/// Number of slots a sequencer can hold. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequencerCapacity(u8);

impl SequencerCapacity {
    /// Create a capacity, rejecting zero.
    pub fn new(slots: u8) -> Result<Self, ConfigurationError> {
        if slots == 0 {
            return Err(ConfigurationError::InvalidCapacity { capacity: slots });
        }
        Ok(Self(slots))
    }

    /// Slot count of a sequencer on the reference part, if it has one at that index.
    pub fn reference(id: SequencerId) -> Option<Self> {
        REFERENCE_CAPACITIES
            .get(usize::from(id.index))
            .map(|&slots| Self(slots))
    }

    /// Number of slots.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SequencerCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One programmed position of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Position in the sequence, from 0
    pub index: u8,
    /// Channel converted at this position
    pub channel: u8,
    /// Whether the sequence ends here
    pub terminal: bool,
}

/// Ordered assignment of channels to sequencer slots.
///
/// Never empty, never longer than the capacity it was allocated for.
/// Replaced wholesale on reallocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotPlan {
    slots: Vec<Slot>,
    dropped: ChannelSet,
}

impl SlotPlan {
    /// Slots in index order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a plan has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot that ends the sequence.
    pub fn terminal(&self) -> &Slot {
        // allocate() never builds an empty plan
        &self.slots[self.slots.len() - 1]
    }

    /// Channels assigned to slots, in slot order.
    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().map(|slot| slot.channel)
    }

    /// Slot index a channel was assigned to.
    pub fn slot_of(&self, channel: u8) -> Option<u8> {
        self.slots
            .iter()
            .find(|slot| slot.channel == channel)
            .map(|slot| slot.index)
    }

    /// Requested channels that did not fit in the sequencer.
    pub fn dropped(&self) -> ChannelSet {
        self.dropped
    }

    /// Whether any requested channel was dropped.
    pub fn is_truncated(&self) -> bool {
        !self.dropped.is_empty()
    }
}

impl<'a> IntoIterator for &'a SlotPlan {
    type Item = &'a Slot;
    type IntoIter = std::slice::Iter<'a, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

/// Assign the requested channels to sequencer slots.
///
/// # Errors
///
/// - [`AllocationError::EmptyRequest`] if no channel is requested
/// - [`AllocationError::ChannelOutOfRange`] if the set yields a channel
///   outside its universe
pub fn allocate(
    capacity: SequencerCapacity,
    requested: ChannelSet,
) -> Result<SlotPlan, AllocationError> {
    if requested.is_empty() {
        return Err(AllocationError::EmptyRequest);
    }

    let needed = requested.count() as usize;
    let actual = needed.min(usize::from(capacity.get()));

    let mut slots = Vec::with_capacity(actual);
    let mut assigned = ChannelSet::empty(requested.universe());
    for (index, channel) in requested.ascending().take(actual).enumerate() {
        assigned = assigned.with(channel)?;
        slots.push(Slot {
            index: index as u8,
            channel,
            terminal: false,
        });
    }

    if slots.len() < actual {
        return Err(AllocationError::ChannelOutOfRange {
            channel: requested.universe(),
            universe: requested.universe(),
        });
    }
    if let Some(last) = slots.last_mut() {
        last.terminal = true;
    }

    let dropped = requested.difference(assigned);

    if !dropped.is_empty() {
        debug!(
            capacity = capacity.get(),
            requested = needed,
            dropped = ?dropped,
            "Sequencer capacity exceeded, dropping highest channels"
        );
    }

    Ok(SlotPlan { slots, dropped })
}
