//! Async capability wrappers.
//!
//! Exposes a single slot of an [`AcquisitionSession`] as a scalar
//! [`Readable`] so it can be driven from async code next to other
//! measurement sources.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use daq_driver_sequencer::hal::{Readable, ReadableChannel};
//! # use daq_driver_sequencer::{
//! #     AdcController, AdcModule, ChannelSet, SequencerCapacity, SequencerId, SimulatedAdc,
//! #     TriggerKind,
//! # };
//!
//! # async fn example() -> anyhow::Result<()> {
//! # let controller = AdcController::new(SimulatedAdc::new());
//! # let id = SequencerId::new(AdcModule::Adc0, 1);
//! # let capacity = SequencerCapacity::new(4)?;
//! # let set = ChannelSet::from_channels(12, &[1, 4, 9])?;
//! # let trigger = TriggerKind::SoftwareTriggered;
//! let session = Arc::new(Mutex::new(controller.configure_channels(id, capacity, set, trigger)?));
//! let ain4 = ReadableChannel::new(Arc::clone(&session), 4)?.with_timeout(10_000);
//!
//! let volts = ain4.read().await?;
//! println!("AIN4: {:.3} V", volts);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::conversion::{to_voltage_with, REFERENCE_VOLTAGE};
use crate::hardware::HardwareRegisterInterface;
use crate::session::AcquisitionSession;

/// Default poll budget of a [`ReadableChannel`].
pub const DEFAULT_TIMEOUT_POLLS: u32 = 100_000;

/// Capability: scalar readout.
///
/// `read()` performs one measurement and returns its value in the
/// implementation's units.
#[async_trait]
pub trait Readable: Send + Sync {
    /// Read the current value.
    async fn read(&self) -> Result<f64>;
}

/// One channel of a shared acquisition session, read in volts.
///
/// Each `read()` runs a full sequencer pass on a blocking thread and picks
/// this channel's sample out of it.
pub struct ReadableChannel<H: HardwareRegisterInterface> {
    session: Arc<Mutex<AcquisitionSession<H>>>,
    channel: u8,
    timeout: u32,
    reference: f64,
}

impl<H: HardwareRegisterInterface> ReadableChannel<H> {
    /// Wrap `channel` of a shared session.
    ///
    /// Fails if the session's slot plan does not convert that channel.
    pub fn new(session: Arc<Mutex<AcquisitionSession<H>>>, channel: u8) -> Result<Self> {
        {
            let guard = session.lock();
            if guard.plan().slot_of(channel).is_none() {
                return Err(anyhow!(
                    "Channel {} is not part of the sequence on {}",
                    channel,
                    guard.sequencer()
                ));
            }
        }
        Ok(Self {
            session,
            channel,
            timeout: DEFAULT_TIMEOUT_POLLS,
            reference: REFERENCE_VOLTAGE,
        })
    }

    /// Set the poll budget of each read.
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the reference voltage used for conversion.
    pub fn with_reference(mut self, reference: f64) -> Self {
        self.reference = reference;
        self
    }

    /// Channel being read.
    pub fn channel(&self) -> u8 {
        self.channel
    }
}

#[async_trait]
impl<H> Readable for ReadableChannel<H>
where
    H: HardwareRegisterInterface + Send + Sync + 'static,
{
    async fn read(&self) -> Result<f64> {
        let session = Arc::clone(&self.session);
        let timeout = self.timeout;

        let samples = tokio::task::spawn_blocking(move || session.lock().read(timeout))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))??;

        let sample = samples
            .get(self.channel)
            .ok_or_else(|| anyhow!("Channel {} missing from sample set", self.channel))?;

        Ok(to_voltage_with(sample.raw, self.reference))
    }
}

impl<H: HardwareRegisterInterface> std::fmt::Debug for ReadableChannel<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadableChannel")
            .field("channel", &self.channel)
            .field("timeout", &self.timeout)
            .field("reference", &self.reference)
            .finish()
    }
}
