//! Channel request bitfields.
//!
//! A [`ChannelSet`] records which analog inputs a caller wants sampled. Bit
//! `i` set means channel `i` is requested. The set remembers the size of its
//! channel universe and never carries bits at or above it.
//!
//! A universe is at most [`MAX_CHANNELS`] wide. Every constructor clamps a
//! larger universe to that width, and [`ChannelSet::universe`] reports the
//! clamped value.

use std::fmt;

use crate::error::AllocationError;

/// Number of single-ended analog inputs on the reference part (AIN0..AIN11).
pub const REFERENCE_CHANNEL_COUNT: u8 = 12;

/// Largest universe a [`ChannelSet`] can describe.
pub const MAX_CHANNELS: u8 = u32::BITS as u8;

/// Immutable set of requested analog channels.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelSet {
    bits: u32,
    universe: u8,
}

impl ChannelSet {
    /// Create an empty set over `universe` channels.
    ///
    /// `universe` is clamped to [`MAX_CHANNELS`].
    pub fn empty(universe: u8) -> Self {
        Self {
            bits: 0,
            universe: universe.min(MAX_CHANNELS),
        }
    }

    /// Create a set from a list of channel ids.
    ///
    /// Duplicates collapse. Any id outside the universe is rejected;
    /// `universe` is clamped to [`MAX_CHANNELS`] first.
    pub fn from_channels(universe: u8, channels: &[u8]) -> Result<Self, AllocationError> {
        channels
            .iter()
            .try_fold(Self::empty(universe), |set, &channel| set.with(channel))
    }

    /// Create a set from a raw bitfield, rejecting bits outside the universe.
    ///
    /// `universe` is clamped to [`MAX_CHANNELS`], so with a universe of 32 or
    /// more every `u32` bitfield is accepted.
    pub fn try_from_bits(universe: u8, bits: u32) -> Result<Self, AllocationError> {
        let set = Self::empty(universe);
        let stray = bits & !set.mask();
        if stray != 0 {
            return Err(AllocationError::ChannelOutOfRange {
                channel: stray.trailing_zeros() as u8,
                universe: set.universe,
            });
        }
        Ok(Self { bits, ..set })
    }

    /// Create a set from a raw bitfield, discarding bits outside the universe.
    ///
    /// `universe` is clamped to [`MAX_CHANNELS`].
    pub fn from_bits_truncate(universe: u8, bits: u32) -> Self {
        let set = Self::empty(universe);
        Self {
            bits: bits & set.mask(),
            ..set
        }
    }

    /// Return a copy of this set with `channel` added.
    pub fn with(self, channel: u8) -> Result<Self, AllocationError> {
        if channel >= self.universe {
            return Err(AllocationError::ChannelOutOfRange {
                channel,
                universe: self.universe,
            });
        }
        Ok(Self {
            bits: self.bits | (1 << channel),
            ..self
        })
    }

    /// Union of two sets. The result spans the larger universe.
    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
            universe: self.universe.max(other.universe),
        }
    }

    /// Channels in `self` that are not in `other`.
    pub fn difference(self, other: Self) -> Self {
        Self {
            bits: self.bits & !other.bits,
            ..self
        }
    }

    /// Check whether `channel` is requested.
    pub fn contains(&self, channel: u8) -> bool {
        channel < self.universe && self.bits & (1 << channel) != 0
    }

    /// Number of requested channels.
    pub fn count(&self) -> u32 {
        self.bits.count_ones()
    }

    /// Check whether no channel is requested.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Size of the channel universe.
    pub fn universe(&self) -> u8 {
        self.universe
    }

    /// Raw bitfield.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Requested channel ids in strictly increasing order.
    ///
    /// The iterator borrows nothing, so scanning the same set again always
    /// yields the same sequence.
    pub fn ascending(&self) -> Ascending {
        Ascending {
            remaining: self.bits,
        }
    }

    fn mask(&self) -> u32 {
        if self.universe >= MAX_CHANNELS {
            u32::MAX
        } else {
            (1u32 << self.universe) - 1
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::empty(REFERENCE_CHANNEL_COUNT)
    }
}

impl fmt::Debug for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ascending()).finish()
    }
}

impl IntoIterator for ChannelSet {
    type Item = u8;
    type IntoIter = Ascending;

    fn into_iter(self) -> Ascending {
        self.ascending()
    }
}

impl IntoIterator for &ChannelSet {
    type Item = u8;
    type IntoIter = Ascending;

    fn into_iter(self) -> Ascending {
        self.ascending()
    }
}

/// Lowest-first scan over the set bits of a [`ChannelSet`].
#[derive(Debug, Clone)]
pub struct Ascending {
    remaining: u32,
}

impl Iterator for Ascending {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.remaining == 0 {
            return None;
        }
        let channel = self.remaining.trailing_zeros() as u8;
        // clear lowest set bit
        self.remaining &= self.remaining - 1;
        Some(channel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Ascending {}

impl std::iter::FusedIterator for Ascending {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_and_count() {
        let set = ChannelSet::from_channels(12, &[1, 4, 9]).unwrap();
        assert!(set.contains(1));
        assert!(set.contains(4));
        assert!(set.contains(9));
        assert!(!set.contains(0));
        assert!(!set.contains(11));
        assert!(!set.contains(31));
        assert_eq!(set.count(), 3);
        assert_eq!(set.bits(), 0b10_0001_0010);
    }

    #[test]
    fn test_ascending_is_ordered_and_restartable() {
        let set = ChannelSet::from_channels(12, &[11, 0, 7, 3]).unwrap();
        let first: Vec<u8> = set.ascending().collect();
        let second: Vec<u8> = set.ascending().collect();
        assert_eq!(first, vec![0, 3, 7, 11]);
        assert_eq!(first, second);
        assert_eq!(set.ascending().len(), 4);
    }

    #[test]
    fn test_duplicates_collapse() {
        let set = ChannelSet::from_channels(12, &[5, 5, 5]).unwrap();
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(
            ChannelSet::from_channels(12, &[2, 12]),
            Err(AllocationError::ChannelOutOfRange {
                channel: 12,
                universe: 12
            })
        );
        assert_eq!(
            ChannelSet::try_from_bits(12, 0x1001),
            Err(AllocationError::ChannelOutOfRange {
                channel: 12,
                universe: 12
            })
        );
    }

    #[test]
    fn test_truncate_clears_high_bits() {
        let set = ChannelSet::from_bits_truncate(12, 0xF00F);
        assert_eq!(set.bits(), 0x000F);
        assert_eq!(set.count(), 4);
    }

    #[test]
    fn test_full_width_universe() {
        let set = ChannelSet::try_from_bits(40, u32::MAX).unwrap();
        assert_eq!(set.universe(), 32);
        assert_eq!(set.count(), 32);
        assert_eq!(set.ascending().last(), Some(31));
    }

    #[test]
    fn test_universe_clamped_to_word_width() {
        assert_eq!(ChannelSet::empty(64).universe(), MAX_CHANNELS);
        assert_eq!(ChannelSet::from_bits_truncate(200, 0x8000_0001).count(), 2);

        let set = ChannelSet::from_channels(64, &[0, 31]).unwrap();
        assert_eq!(set.universe(), 32);
        assert_eq!(
            ChannelSet::from_channels(64, &[32]),
            Err(AllocationError::ChannelOutOfRange {
                channel: 32,
                universe: 32
            })
        );
    }

    #[test]
    fn test_set_algebra() {
        let a = ChannelSet::from_channels(12, &[1, 2, 3]).unwrap();
        let b = ChannelSet::from_channels(12, &[3, 4]).unwrap();
        assert_eq!(a.union(b).ascending().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(a.difference(b).ascending().collect::<Vec<_>>(), vec![1, 2]);
        assert!(ChannelSet::empty(12).is_empty());
    }

    #[test]
    fn test_debug_lists_channels() {
        let set = ChannelSet::from_channels(12, &[2, 5]).unwrap();
        assert_eq!(format!("{:?}", set), "{2, 5}");
    }
}
