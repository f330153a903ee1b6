//! Hardware collaborator contracts.
//!
//! The allocation and acquisition engine never touches registers directly.
//! Everything it needs from the chip goes through [`HardwareRegisterInterface`]
//! and [`PinConfigurator`]. Implementations use interior mutability so one
//! handle can be shared between the controller and every session it hands out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pins::{GpioPort, PinDescriptor};

/// ADC module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdcModule {
    /// First ADC module
    Adc0,
    /// Second ADC module
    Adc1,
}

impl fmt::Display for AdcModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adc0 => write!(f, "ADC0"),
            Self::Adc1 => write!(f, "ADC1"),
        }
    }
}

/// Identity of one sample sequencer.
///
/// Any combination can be constructed; the hardware decides whether it
/// exists via [`HardwareRegisterInterface::has_sequencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequencerId {
    /// Owning ADC module
    pub module: AdcModule,
    /// Sequencer number within the module
    pub index: u8,
}

impl SequencerId {
    /// Create a sequencer identity.
    pub const fn new(module: AdcModule, index: u8) -> Self {
        Self { module, index }
    }
}

impl fmt::Display for SequencerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/SS{}", self.module, self.index)
    }
}

/// Event source that starts a conversion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Processor-issued trigger, one pass per `read()`
    #[default]
    SoftwareTriggered,
    /// Hardware timer trigger
    TimerTriggered,
    /// Free-running, a new pass starts as soon as the previous one ends
    AlwaysTriggered,
}

impl TriggerKind {
    /// Whether `read()` has to issue the trigger itself.
    pub fn requires_software_trigger(self) -> bool {
        matches!(self, Self::SoftwareTriggered)
    }
}

/// Register-level access to the ADC sequencers.
///
/// Methods take `&self`; implementations serialize register access
/// internally.
pub trait HardwareRegisterInterface {
    /// Whether the hardware has a sequencer with this identity.
    fn has_sequencer(&self, id: SequencerId) -> bool;

    /// Select the trigger source of a sequencer.
    fn configure_trigger(&self, id: SequencerId, trigger: TriggerKind);

    /// Bind `channel` to slot `slot`. `is_terminal` ends the sequence at this
    /// slot and raises the completion condition when it converts.
    fn program_slot(&self, id: SequencerId, slot: u8, channel: u8, is_terminal: bool);

    /// Start accepting triggers.
    fn enable_sequencer(&self, id: SequencerId);

    /// Stop accepting triggers.
    fn disable_sequencer(&self, id: SequencerId);

    /// Whether a full pass has completed since the last clear.
    fn poll_completion(&self, id: SequencerId) -> bool;

    /// Acknowledge the completion condition.
    fn clear_completion(&self, id: SequencerId);

    /// Raw 12-bit samples of the last pass, one per programmed slot, in slot order.
    fn read_raw_samples(&self, id: SequencerId) -> Vec<u16>;

    /// Start one conversion pass.
    fn issue_software_trigger(&self, id: SequencerId);

    /// Route the completion condition to the sequencer's interrupt line.
    fn enable_completion_interrupt(&self, id: SequencerId);
}

/// Electrical routing of analog inputs to pins.
pub trait PinConfigurator {
    /// Enable the clock of a GPIO port. Idempotent.
    fn enable_port(&self, port: GpioPort);

    /// Switch a pin to its analog input function. Idempotent.
    fn enable_analog_input(&self, pin: PinDescriptor);
}
