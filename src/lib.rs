//! Channel-to-sequencer allocation and acquisition for multi-sequencer ADCs.
//!
//! Microcontroller ADCs expose a handful of sample sequencers, each with a
//! fixed number of slots. This crate turns a set of requested analog channels
//! into a deterministic slot plan, programs a sequencer from it, and reads
//! back one 12-bit sample per slot on demand.
//!
//! # Architecture
//!
//! ## Allocation
//! - [`ChannelSet`] - Validated set of channel ids over a bounded universe
//! - [`allocate`] - Ascending, capacity-bounded slot assignment into a [`SlotPlan`]
//! - [`configure_pins`] / [`PIN_MAP`] - Fixed channel to pin wiring
//!
//! ## Acquisition
//! - [`AdcController`] - Exclusive ownership of sequencers on shared hardware
//! - [`AcquisitionSession`] - Trigger, poll, read and clear one pass
//! - [`SampleSet`] - Samples of one pass in slot order
//!
//! ## Hardware
//! - [`HardwareRegisterInterface`] / [`PinConfigurator`] - Register-level seams
//! - [`SimulatedAdc`] - In-memory two-module ADC
//! - [`CompletionFlag`] - Completion condition shared with interrupt context
//! - [`PollClock`] - Pause policy between completion polls
//!
//! ## Conversion
//! - [`to_voltage`] / [`format_voltage`] / [`format_hex`] - Raw sample rendering
//!
//! ## HAL Traits
//! - [`Readable`] / [`ReadableChannel`] - Async scalar readout of one channel
//!
//! # Example
//!
//! ```
//! use daq_driver_sequencer::{
//!     allocate, AdcController, AdcModule, ChannelSet, SequencerCapacity, SequencerId,
//!     SimulatedAdc, TriggerKind,
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let adc = SimulatedAdc::new();
//! adc.set_input(0, 4095);
//!
//! let requested = ChannelSet::from_channels(12, &[0, 3, 7, 11])?;
//! let plan = allocate(SequencerCapacity::new(2)?, requested)?;
//! assert_eq!(plan.channels().collect::<Vec<_>>(), vec![0, 3]);
//! assert!(plan.is_truncated());
//!
//! let controller = AdcController::new(adc);
//! let mut session = controller.configure(
//!     SequencerId::new(AdcModule::Adc0, 0),
//!     plan,
//!     TriggerKind::SoftwareTriggered,
//! )?;
//!
//! let samples = session.read(100)?;
//! assert_eq!(samples.samples()[0].formatted(), "3.00");
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod channel_set;
pub mod completion;
pub mod config;
pub mod conversion;
pub mod error;
pub mod hal;
pub mod hardware;
pub mod logging;
pub mod pins;
pub mod session;
pub mod simulated;
pub mod timing;

pub use allocator::{allocate, SequencerCapacity, Slot, SlotPlan, REFERENCE_CAPACITIES};
pub use channel_set::{ChannelSet, MAX_CHANNELS, REFERENCE_CHANNEL_COUNT};
pub use completion::CompletionFlag;
pub use config::AcquisitionConfig;
pub use conversion::{
    format_hex, format_voltage, saturate, to_voltage, to_voltage_with, FULL_SCALE,
    REFERENCE_VOLTAGE,
};
pub use error::{AcquisitionError, AllocationError, ConfigurationError, Result, SequencerError};
pub use hal::{Readable, ReadableChannel};
pub use hardware::{
    AdcModule, HardwareRegisterInterface, PinConfigurator, SequencerId, TriggerKind,
};
pub use pins::{configure_pins, pin_for, GpioPort, PinDescriptor, PIN_MAP};
pub use session::{AcquisitionSession, AdcController, Sample, SampleSet, SessionState};
pub use simulated::{SimulatedAdc, StepControl};
pub use timing::{PollClock, SleepClock, SpinClock};
