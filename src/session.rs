//! Sequencer ownership and acquisition sessions.
//!
//! [`AdcController`] owns the shared hardware handle and hands out at most
//! one [`AcquisitionSession`] per sequencer identity. Configuring a sequencer
//! that already has a session supersedes it: the old session stops owning
//! the hardware and its reads fail with [`AcquisitionError::Released`].
//!
//! # Example
//!
//! ```
//! use daq_driver_sequencer::{
//!     AdcController, AdcModule, ChannelSet, SequencerCapacity, SequencerId, SimulatedAdc,
//!     TriggerKind,
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let adc = SimulatedAdc::new();
//! adc.set_input(4, 2048);
//!
//! let controller = AdcController::new(adc);
//! let id = SequencerId::new(AdcModule::Adc0, 1);
//! let channels = ChannelSet::from_channels(12, &[1, 4, 9])?;
//!
//! let mut session = controller.configure_channels(
//!     id,
//!     SequencerCapacity::new(4)?,
//!     channels,
//!     TriggerKind::SoftwareTriggered,
//! )?;
//!
//! let samples = session.read(1000)?;
//! assert_eq!(samples.len(), 3);
//! assert_eq!(samples.get(4).map(|s| s.raw), Some(2048));
//!
//! session.release();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::allocator::{allocate, SequencerCapacity, SlotPlan};
use crate::channel_set::ChannelSet;
use crate::conversion::{format_voltage, saturate, to_voltage};
use crate::error::{AcquisitionError, ConfigurationError, Result};
use crate::hardware::{HardwareRegisterInterface, SequencerId, TriggerKind};
use crate::timing::{PollClock, SpinClock};

/// Which session currently owns each sequencer.
#[derive(Debug, Default)]
struct LeaseTable {
    next: u64,
    owners: HashMap<SequencerId, u64>,
}

impl LeaseTable {
    fn grant(&mut self, id: SequencerId) -> (u64, Option<u64>) {
        self.next += 1;
        let previous = self.owners.insert(id, self.next);
        (self.next, previous)
    }

    fn owns(&self, id: SequencerId, lease: u64) -> bool {
        self.owners.get(&id) == Some(&lease)
    }
}

/// Hands out exclusive acquisition sessions on a shared ADC.
pub struct AdcController<H> {
    hardware: Arc<H>,
    leases: Arc<Mutex<LeaseTable>>,
}

impl<H: HardwareRegisterInterface> AdcController<H> {
    /// Create a controller owning `hardware`.
    pub fn new(hardware: H) -> Self {
        Self::from_shared(Arc::new(hardware))
    }

    /// Create a controller over an already shared hardware handle.
    pub fn from_shared(hardware: Arc<H>) -> Self {
        Self {
            hardware,
            leases: Arc::new(Mutex::new(LeaseTable::default())),
        }
    }

    /// The hardware handle.
    pub fn hardware(&self) -> &Arc<H> {
        &self.hardware
    }

    /// Whether a live session currently owns the sequencer.
    pub fn is_armed(&self, id: SequencerId) -> bool {
        self.leases.lock().owners.contains_key(&id)
    }

    /// Program a sequencer from a slot plan and arm it.
    ///
    /// Any session already bound to `id` is superseded. The sequencer is
    /// disabled while its slots are rewritten, then re-enabled with the
    /// completion condition cleared.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidSequencerIdentity`] if the hardware has
    /// no such sequencer. Nothing is written in that case.
    pub fn configure(
        &self,
        id: SequencerId,
        plan: SlotPlan,
        trigger: TriggerKind,
    ) -> std::result::Result<AcquisitionSession<H>, ConfigurationError> {
        if !self.hardware.has_sequencer(id) {
            warn!(sequencer = %id, "Rejected configuration of unknown sequencer");
            return Err(ConfigurationError::InvalidSequencerIdentity { id });
        }

        let mut table = self.leases.lock();
        let (lease, previous) = table.grant(id);
        if previous.is_some() {
            debug!(sequencer = %id, "Superseding previous session");
        }

        let hw = &self.hardware;
        hw.disable_sequencer(id);
        hw.configure_trigger(id, trigger);
        for slot in &plan {
            trace!(
                sequencer = %id,
                slot = slot.index,
                channel = slot.channel,
                terminal = slot.terminal,
                "Programming slot"
            );
            hw.program_slot(id, slot.index, slot.channel, slot.terminal);
        }
        hw.enable_sequencer(id);
        hw.clear_completion(id);
        drop(table);

        info!(
            sequencer = %id,
            trigger = ?trigger,
            slots = plan.len(),
            truncated = plan.is_truncated(),
            "Sequencer armed"
        );

        Ok(AcquisitionSession {
            hardware: Arc::clone(&self.hardware),
            leases: Arc::clone(&self.leases),
            id,
            trigger,
            plan,
            lease,
            state: SessionState::Armed,
        })
    }

    /// Allocate `channels` onto a sequencer of `capacity` slots and arm it.
    pub fn configure_channels(
        &self,
        id: SequencerId,
        capacity: SequencerCapacity,
        channels: ChannelSet,
        trigger: TriggerKind,
    ) -> Result<AcquisitionSession<H>> {
        let plan = allocate(capacity, channels)?;
        Ok(self.configure(id, plan, trigger)?)
    }
}

impl<H> Clone for AdcController<H> {
    fn clone(&self) -> Self {
        Self {
            hardware: Arc::clone(&self.hardware),
            leases: Arc::clone(&self.leases),
        }
    }
}

impl<H> fmt::Debug for AdcController<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.leases.lock();
        let mut armed: Vec<_> = table.owners.keys().copied().collect();
        armed.sort();
        f.debug_struct("AdcController")
            .field("armed", &armed)
            .finish()
    }
}

/// Lifecycle of an [`AcquisitionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Programmed and enabled, waiting for reads
    Armed,
    /// Inside `read()`
    Sampling,
    /// Disarmed; no further reads
    Released,
}

/// Runtime state of one armed sequencer.
///
/// Dropping an armed session releases it.
pub struct AcquisitionSession<H: HardwareRegisterInterface> {
    hardware: Arc<H>,
    leases: Arc<Mutex<LeaseTable>>,
    id: SequencerId,
    trigger: TriggerKind,
    plan: SlotPlan,
    lease: u64,
    state: SessionState,
}

impl<H: HardwareRegisterInterface> AcquisitionSession<H> {
    /// Sequencer this session is bound to.
    pub fn sequencer(&self) -> SequencerId {
        self.id
    }

    /// Trigger source chosen at configuration.
    pub fn trigger(&self) -> TriggerKind {
        self.trigger
    }

    /// Slot plan programmed into the sequencer.
    pub fn plan(&self) -> &SlotPlan {
        &self.plan
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether this session still owns its sequencer.
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Released && self.leases.lock().owns(self.id, self.lease)
    }

    /// Run one acquisition pass, spinning between completion polls.
    ///
    /// See [`read_with_clock`](Self::read_with_clock).
    pub fn read(&mut self, timeout: u32) -> std::result::Result<SampleSet, AcquisitionError> {
        self.read_with_clock(timeout, &mut SpinClock)
    }

    /// Run one acquisition pass.
    ///
    /// Issues a software trigger when the trigger kind needs one, then polls
    /// the completion condition at most `timeout` times (once when `timeout`
    /// is 0, which never waits and is the mode to use from interrupt context).
    /// `clock` is paused between polls.
    ///
    /// On completion the samples are read in slot order and the completion
    /// condition is cleared exactly once.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::Timeout`] if no pass completed within the budget;
    ///   nothing but the trigger has happened
    /// - [`AcquisitionError::Released`] if the session no longer owns the
    ///   sequencer, including when a `configure` on another controller handle
    ///   supersedes it mid-read; the FIFO and completion condition are then
    ///   left to the new owner
    /// - [`AcquisitionError::SampleCountMismatch`] if the hardware delivered
    ///   the wrong number of samples
    pub fn read_with_clock<C>(
        &mut self,
        timeout: u32,
        clock: &mut C,
    ) -> std::result::Result<SampleSet, AcquisitionError>
    where
        C: PollClock + ?Sized,
    {
        if !self.is_active() {
            self.state = SessionState::Released;
            return Err(AcquisitionError::Released { id: self.id });
        }

        self.state = SessionState::Sampling;
        let result = self.sample(timeout, clock);
        self.state = match result {
            Err(AcquisitionError::Released { .. }) => SessionState::Released,
            _ => SessionState::Armed,
        };
        result
    }

    fn sample<C>(
        &self,
        timeout: u32,
        clock: &mut C,
    ) -> std::result::Result<SampleSet, AcquisitionError>
    where
        C: PollClock + ?Sized,
    {
        let hw = &self.hardware;
        let id = self.id;
        let released = || {
            debug!(sequencer = %id, "Session superseded during read");
            AcquisitionError::Released { id }
        };

        if self.trigger.requires_software_trigger() {
            let table = self.leases.lock();
            if !table.owns(id, self.lease) {
                return Err(released());
            }
            trace!(sequencer = %id, "Issuing software trigger");
            hw.issue_software_trigger(id);
        }

        let mut attempt = 0u32;
        while !hw.poll_completion(id) {
            attempt += 1;
            if attempt >= timeout {
                if !self.leases.lock().owns(id, self.lease) {
                    return Err(released());
                }
                debug!(sequencer = %id, timeout, "Conversion not complete within budget");
                return Err(AcquisitionError::Timeout { id, timeout });
            }
            clock.pause(attempt);
        }

        // Held until the pass is consumed so `configure` cannot reprogram the
        // sequencer between the ownership check and the FIFO read.
        let table = self.leases.lock();
        if !table.owns(id, self.lease) {
            return Err(released());
        }
        let raw = hw.read_raw_samples(id);
        hw.clear_completion(id);
        drop(table);

        if raw.len() != self.plan.len() {
            warn!(
                sequencer = %id,
                expected = self.plan.len(),
                actual = raw.len(),
                "Sample count does not match programmed slots"
            );
            return Err(AcquisitionError::SampleCountMismatch {
                id,
                expected: self.plan.len(),
                actual: raw.len(),
            });
        }

        trace!(sequencer = %id, polls = attempt + 1, "Conversion complete");
        Ok(SampleSet::new(id, &self.plan, &raw))
    }

    /// Route this sequencer's completion condition to its interrupt line.
    pub fn enable_completion_interrupt(&self) -> std::result::Result<(), AcquisitionError> {
        if !self.is_active() {
            return Err(AcquisitionError::Released { id: self.id });
        }
        self.hardware.enable_completion_interrupt(self.id);
        debug!(sequencer = %self.id, "Completion interrupt enabled");
        Ok(())
    }

    /// Disarm the sequencer and end the session.
    pub fn release(mut self) {
        self.disarm();
    }

    fn disarm(&mut self) {
        if self.state == SessionState::Released {
            return;
        }
        self.state = SessionState::Released;

        let mut table = self.leases.lock();
        if !table.owns(self.id, self.lease) {
            debug!(sequencer = %self.id, "Session already superseded, leaving sequencer armed");
            return;
        }
        table.owners.remove(&self.id);
        self.hardware.disable_sequencer(self.id);
        info!(sequencer = %self.id, "Sequencer released");
    }
}

impl<H: HardwareRegisterInterface> Drop for AcquisitionSession<H> {
    fn drop(&mut self) {
        self.disarm();
    }
}

impl<H: HardwareRegisterInterface> fmt::Debug for AcquisitionSession<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionSession")
            .field("sequencer", &self.id)
            .field("trigger", &self.trigger)
            .field("slots", &self.plan.len())
            .field("state", &self.state)
            .finish()
    }
}

/// One converted slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Slot that produced the sample
    pub slot: u8,
    /// Channel converted in that slot
    pub channel: u8,
    /// Raw 12-bit value
    pub raw: u16,
}

impl Sample {
    /// Value in volts against the reference voltage.
    pub fn voltage(&self) -> f64 {
        to_voltage(self.raw)
    }

    /// Value as a `D.DD` voltage string.
    pub fn formatted(&self) -> String {
        format_voltage(self.raw)
    }
}

/// Samples of one completed pass, one per slot, in slot order.
///
/// Raw values are passed through [`saturate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSet {
    sequencer: SequencerId,
    samples: Vec<Sample>,
}

impl SampleSet {
    fn new(sequencer: SequencerId, plan: &SlotPlan, raw: &[u16]) -> Self {
        let samples = plan
            .slots()
            .iter()
            .zip(raw)
            .map(|(slot, &value)| Sample {
                slot: slot.index,
                channel: slot.channel,
                raw: saturate(value),
            })
            .collect();
        Self { sequencer, samples }
    }

    /// Sequencer that produced the samples.
    pub fn sequencer(&self) -> SequencerId {
        self.sequencer
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in slot order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Iterate samples in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Sample of a given channel.
    pub fn get(&self, channel: u8) -> Option<&Sample> {
        self.samples.iter().find(|s| s.channel == channel)
    }

    /// Raw values in slot order.
    pub fn raw(&self) -> Vec<u16> {
        self.samples.iter().map(|s| s.raw).collect()
    }

    /// Voltages in slot order.
    pub fn voltages(&self) -> Vec<f64> {
        self.samples.iter().map(Sample::voltage).collect()
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::AdcModule;

    #[test]
    fn test_lease_table_supersedes() {
        let ss0 = SequencerId::new(AdcModule::Adc0, 0);
        let ss1 = SequencerId::new(AdcModule::Adc0, 1);
        let mut table = LeaseTable::default();

        let (first, previous) = table.grant(ss0);
        assert_eq!(previous, None);
        assert!(table.owns(ss0, first));

        let (second, previous) = table.grant(ss0);
        assert_eq!(previous, Some(first));
        assert!(!table.owns(ss0, first));
        assert!(table.owns(ss0, second));

        let (other, _) = table.grant(ss1);
        assert!(table.owns(ss1, other));
        assert!(!table.owns(ss1, second));
    }

    #[test]
    fn test_sample_set_saturates_out_of_range_values() {
        let id = SequencerId::new(AdcModule::Adc1, 0);
        let plan = allocate(
            SequencerCapacity::new(2).unwrap(),
            ChannelSet::from_channels(12, &[3, 8]).unwrap(),
        )
        .unwrap();

        let set = SampleSet::new(id, &plan, &[0xF123, 0x0FFF]);

        assert_eq!(set.raw(), vec![0xFFF, 0xFFF]);
        assert_eq!(set.voltages()[0], 3.0);
        assert_eq!(set.get(8).map(|s| s.slot), Some(1));
        assert_eq!(set.voltages()[1], 3.0);
        assert!(set.get(4).is_none());
    }
}
