//! Error types for sequencer allocation, configuration and acquisition.
//!
//! Errors are split by the layer that produces them so callers can tell a
//! misconfigured request (stop and fix it) from a transient lack of data
//! (safe to poll again). [`SequencerError`] wraps all three for code that
//! drives the whole pipeline.

use thiserror::Error;

use crate::hardware::SequencerId;

/// Result type alias for operations spanning several layers.
pub type Result<T> = std::result::Result<T, SequencerError>;

/// Errors produced while turning a channel request into a slot plan.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    /// No channels were requested; there is no valid zero-slot plan.
    #[error("No channels requested: a sequence needs at least one channel")]
    EmptyRequest,

    /// A requested channel lies outside the channel universe.
    #[error("Channel {channel} is out of range: only {universe} channels are available")]
    ChannelOutOfRange {
        /// Offending channel id
        channel: u8,
        /// Number of channels in the universe
        universe: u8,
    },
}

/// Errors produced while programming a sequencer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The hardware has no sequencer with this identity.
    #[error("Unknown sequencer {id}")]
    InvalidSequencerIdentity {
        /// Rejected identity
        id: SequencerId,
    },

    /// A sequencer capacity of zero slots was requested.
    #[error("Invalid sequencer capacity {capacity}: at least one slot is required")]
    InvalidCapacity {
        /// Rejected capacity
        capacity: u8,
    },

    /// Configuration values could not be turned into a valid request.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong
        message: String,
    },
}

/// Errors produced while reading samples from an armed sequencer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// No completed conversion was observed within the poll budget.
    #[error("No conversion completed on {id} within {timeout} polls")]
    Timeout {
        /// Sequencer that was polled
        id: SequencerId,
        /// Poll budget that was exhausted
        timeout: u32,
    },

    /// The session no longer owns its sequencer.
    #[error("Session on {id} was released or superseded by a newer configuration")]
    Released {
        /// Sequencer the session was bound to
        id: SequencerId,
    },

    /// The hardware returned a different number of samples than slots programmed.
    #[error("Sequencer {id} returned {actual} samples, expected {expected}")]
    SampleCountMismatch {
        /// Sequencer that was read
        id: SequencerId,
        /// Number of programmed slots
        expected: usize,
        /// Number of samples delivered
        actual: usize,
    },
}

/// Any error from the allocation, configuration or acquisition layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencerError {
    /// Allocation failed
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Configuration failed
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Acquisition failed
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

impl SequencerError {
    /// Check if the request itself is wrong and retrying it unchanged is pointless.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Allocation(_) | Self::Configuration(_))
    }

    /// Check if this is a "no data yet" condition that is safe to poll again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Acquisition(AcquisitionError::Timeout { .. }))
    }
}
