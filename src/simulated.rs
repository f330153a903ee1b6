//! In-memory ADC for development and tests without a board.
//!
//! [`SimulatedAdc`] models two ADC modules with four sequencers each. Analog
//! inputs are plain settable values. A conversion pass starts on the
//! configured trigger, completes after a programmable number of completion
//! polls, latches one sample per programmed step up to the END step and
//! raises the sequencer's [`CompletionFlag`].
//!
//! # Example
//!
//! ```
//! use daq_driver_sequencer::{AdcModule, HardwareRegisterInterface, SequencerId, SimulatedAdc, TriggerKind};
//!
//! let adc = SimulatedAdc::new();
//! let id = SequencerId::new(AdcModule::Adc0, 3);
//! adc.set_input(7, 1234);
//!
//! adc.configure_trigger(id, TriggerKind::SoftwareTriggered);
//! adc.program_slot(id, 0, 7, true);
//! adc.enable_sequencer(id);
//! adc.issue_software_trigger(id);
//!
//! assert!(adc.poll_completion(id));
//! assert_eq!(adc.read_raw_samples(id), vec![1234]);
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::completion::CompletionFlag;
use crate::conversion::saturate;
use crate::hardware::{
    AdcModule, HardwareRegisterInterface, PinConfigurator, SequencerId, TriggerKind,
};
use crate::pins::{GpioPort, PinDescriptor};

/// Sequencers per ADC module.
pub const SEQUENCERS_PER_MODULE: u8 = 4;

/// Step registers per sequencer.
pub const STEPS_PER_SEQUENCER: usize = 8;

const INPUTS: usize = 32;

bitflags! {
    /// Control bits of a programmed sequencer step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StepControl: u8 {
        /// Sequence ends after this step
        const END = 0x20;
        /// Step raises the completion condition
        const IE = 0x40;
    }
}

/// Register image of one sequencer.
#[derive(Debug, Default)]
struct SequencerRegs {
    enabled: bool,
    trigger: Option<TriggerKind>,
    steps: [Option<(u8, StepControl)>; STEPS_PER_SEQUENCER],
    /// Polls left before the running pass completes
    pending: Option<u32>,
    fifo: Vec<u16>,
    interrupt_enabled: bool,
    triggers: u32,
    clears: u32,
}

#[derive(Debug)]
struct SimState {
    inputs: [u16; INPUTS],
    latency: u32,
    sequencers: HashMap<SequencerId, SequencerRegs>,
    ports: BTreeSet<GpioPort>,
    analog_pins: BTreeSet<PinDescriptor>,
}

/// Simulated two-module ADC with settable analog inputs.
pub struct SimulatedAdc {
    state: Mutex<SimState>,
    completion: HashMap<SequencerId, Arc<CompletionFlag>>,
}

impl SimulatedAdc {
    /// Create an ADC whose passes complete on the first poll after triggering.
    pub fn new() -> Self {
        let ids: Vec<SequencerId> = [AdcModule::Adc0, AdcModule::Adc1]
            .into_iter()
            .flat_map(|module| {
                (0..SEQUENCERS_PER_MODULE).map(move |index| SequencerId::new(module, index))
            })
            .collect();

        Self {
            state: Mutex::new(SimState {
                inputs: [0; INPUTS],
                latency: 0,
                sequencers: ids.iter().map(|&id| (id, SequencerRegs::default())).collect(),
                ports: BTreeSet::new(),
                analog_pins: BTreeSet::new(),
            }),
            completion: ids
                .iter()
                .map(|&id| (id, Arc::new(CompletionFlag::new())))
                .collect(),
        }
    }

    /// Set how many completion polls a pass takes before it completes.
    pub fn with_latency(self, polls: u32) -> Self {
        self.set_latency(polls);
        self
    }

    /// Set how many completion polls a pass takes before it completes.
    pub fn set_latency(&self, polls: u32) {
        self.state.lock().latency = polls;
    }

    /// Drive an analog input to a raw 12-bit level.
    pub fn set_input(&self, channel: u8, raw: u16) {
        let mut state = self.state.lock();
        match state.inputs.get_mut(usize::from(channel)) {
            Some(level) => *level = saturate(raw),
            None => warn!(channel, "Ignoring input level for nonexistent channel"),
        }
    }

    /// Completion flag of a sequencer, for raising completion from another context.
    pub fn completion_flag(&self, id: SequencerId) -> Option<Arc<CompletionFlag>> {
        self.completion.get(&id).cloned()
    }

    /// Fire the timer trigger of a sequencer.
    pub fn fire_timer(&self, id: SequencerId) {
        self.start_pass(id, TriggerKind::TimerTriggered);
    }

    /// Whether the sequencer is enabled.
    pub fn is_enabled(&self, id: SequencerId) -> bool {
        self.with_regs(id, |regs| regs.enabled).unwrap_or(false)
    }

    /// Trigger source last configured on the sequencer.
    pub fn trigger_of(&self, id: SequencerId) -> Option<TriggerKind> {
        self.with_regs(id, |regs| regs.trigger).flatten()
    }

    /// Channel and control bits programmed into a step.
    pub fn step(&self, id: SequencerId, slot: u8) -> Option<(u8, StepControl)> {
        self.with_regs(id, |regs| {
            regs.steps.get(usize::from(slot)).copied().flatten()
        })
        .flatten()
    }

    /// Number of software triggers issued to the sequencer.
    pub fn trigger_count(&self, id: SequencerId) -> u32 {
        self.with_regs(id, |regs| regs.triggers).unwrap_or(0)
    }

    /// Number of times the completion condition was cleared.
    pub fn clear_count(&self, id: SequencerId) -> u32 {
        self.with_regs(id, |regs| regs.clears).unwrap_or(0)
    }

    /// Whether completion is routed to the interrupt line.
    pub fn interrupt_enabled(&self, id: SequencerId) -> bool {
        self.with_regs(id, |regs| regs.interrupt_enabled)
            .unwrap_or(false)
    }

    /// GPIO ports whose clocks are enabled.
    pub fn enabled_ports(&self) -> Vec<GpioPort> {
        self.state.lock().ports.iter().copied().collect()
    }

    /// Pins switched to their analog function.
    pub fn analog_pins(&self) -> Vec<PinDescriptor> {
        self.state.lock().analog_pins.iter().copied().collect()
    }

    fn with_regs<T>(&self, id: SequencerId, f: impl FnOnce(&SequencerRegs) -> T) -> Option<T> {
        self.state.lock().sequencers.get(&id).map(f)
    }

    fn start_pass(&self, id: SequencerId, source: TriggerKind) {
        let mut state = self.state.lock();
        let latency = state.latency;
        let Some(regs) = state.sequencers.get_mut(&id) else {
            return;
        };
        if regs.enabled && regs.trigger == Some(source) && regs.pending.is_none() {
            trace!(sequencer = %id, latency, "Conversion pass started");
            regs.pending = Some(latency);
        }
    }
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimulatedAdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let mut enabled: Vec<_> = state
            .sequencers
            .iter()
            .filter(|(_, regs)| regs.enabled)
            .map(|(id, _)| *id)
            .collect();
        enabled.sort();
        f.debug_struct("SimulatedAdc")
            .field("latency", &state.latency)
            .field("enabled", &enabled)
            .finish()
    }
}

impl HardwareRegisterInterface for SimulatedAdc {
    fn has_sequencer(&self, id: SequencerId) -> bool {
        self.completion.contains_key(&id)
    }

    fn configure_trigger(&self, id: SequencerId, trigger: TriggerKind) {
        if let Some(regs) = self.state.lock().sequencers.get_mut(&id) {
            regs.trigger = Some(trigger);
        }
    }

    fn program_slot(&self, id: SequencerId, slot: u8, channel: u8, is_terminal: bool) {
        let control = if is_terminal {
            StepControl::END | StepControl::IE
        } else {
            StepControl::empty()
        };
        let mut state = self.state.lock();
        let Some(step) = state
            .sequencers
            .get_mut(&id)
            .and_then(|regs| regs.steps.get_mut(usize::from(slot)))
        else {
            warn!(sequencer = %id, slot, "Ignoring write to nonexistent step");
            return;
        };
        *step = Some((channel, control));
    }

    fn enable_sequencer(&self, id: SequencerId) {
        if let Some(regs) = self.state.lock().sequencers.get_mut(&id) {
            regs.enabled = true;
        }
    }

    fn disable_sequencer(&self, id: SequencerId) {
        if let Some(regs) = self.state.lock().sequencers.get_mut(&id) {
            regs.enabled = false;
            regs.pending = None;
        }
    }

    fn poll_completion(&self, id: SequencerId) -> bool {
        let Some(flag) = self.completion.get(&id) else {
            return false;
        };

        let mut state = self.state.lock();
        let SimState {
            inputs,
            latency,
            sequencers,
            ..
        } = &mut *state;
        let Some(regs) = sequencers.get_mut(&id) else {
            return false;
        };

        if regs.enabled
            && regs.trigger == Some(TriggerKind::AlwaysTriggered)
            && regs.pending.is_none()
            && !flag.is_set()
        {
            regs.pending = Some(*latency);
        }

        match regs.pending {
            Some(0) => {
                regs.pending = None;
                regs.fifo.clear();
                for (channel, control) in regs.steps.iter().map_while(|step| *step) {
                    regs.fifo.push(inputs.get(usize::from(channel)).copied().unwrap_or(0));
                    if control.contains(StepControl::END) {
                        break;
                    }
                }
                trace!(sequencer = %id, samples = regs.fifo.len(), "Conversion pass complete");
                flag.signal();
            }
            Some(remaining) => regs.pending = Some(remaining - 1),
            None => {}
        }

        flag.is_set()
    }

    fn clear_completion(&self, id: SequencerId) {
        if let Some(flag) = self.completion.get(&id) {
            flag.clear();
        }
        if let Some(regs) = self.state.lock().sequencers.get_mut(&id) {
            regs.clears += 1;
        }
    }

    fn read_raw_samples(&self, id: SequencerId) -> Vec<u16> {
        self.state
            .lock()
            .sequencers
            .get_mut(&id)
            .map(|regs| std::mem::take(&mut regs.fifo))
            .unwrap_or_default()
    }

    fn issue_software_trigger(&self, id: SequencerId) {
        if let Some(regs) = self.state.lock().sequencers.get_mut(&id) {
            regs.triggers += 1;
        }
        self.start_pass(id, TriggerKind::SoftwareTriggered);
    }

    fn enable_completion_interrupt(&self, id: SequencerId) {
        if let Some(regs) = self.state.lock().sequencers.get_mut(&id) {
            regs.interrupt_enabled = true;
        }
    }
}

impl PinConfigurator for SimulatedAdc {
    fn enable_port(&self, port: GpioPort) {
        self.state.lock().ports.insert(port);
    }

    fn enable_analog_input(&self, pin: PinDescriptor) {
        self.state.lock().analog_pins.insert(pin);
    }
}
