//! Error paths of allocation, configuration and acquisition.

use std::sync::atomic::{AtomicU32, Ordering};

use daq_driver_sequencer::{
    allocate, AcquisitionError, AdcController, AdcModule, AllocationError, ChannelSet,
    ConfigurationError, HardwareRegisterInterface, SequencerCapacity, SequencerError,
    SequencerId, SimulatedAdc, TriggerKind,
};

const SS0: SequencerId = SequencerId::new(AdcModule::Adc0, 0);

/// Hardware that always completes but delivers a single sample.
#[derive(Default)]
struct ShortFifo {
    writes: AtomicU32,
    clears: AtomicU32,
}

impl HardwareRegisterInterface for ShortFifo {
    fn has_sequencer(&self, id: SequencerId) -> bool {
        id == SS0
    }

    fn configure_trigger(&self, _id: SequencerId, _trigger: TriggerKind) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn program_slot(&self, _id: SequencerId, _slot: u8, _channel: u8, _is_terminal: bool) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn enable_sequencer(&self, _id: SequencerId) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn disable_sequencer(&self, _id: SequencerId) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    fn poll_completion(&self, _id: SequencerId) -> bool {
        true
    }

    fn clear_completion(&self, _id: SequencerId) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    fn read_raw_samples(&self, _id: SequencerId) -> Vec<u16> {
        vec![0x0ABC]
    }

    fn issue_software_trigger(&self, _id: SequencerId) {}

    fn enable_completion_interrupt(&self, _id: SequencerId) {}
}

fn set(ids: &[u8]) -> ChannelSet {
    ChannelSet::from_channels(12, ids).unwrap()
}

#[test]
fn test_unknown_sequencer_has_no_side_effects() {
    let controller = AdcController::new(ShortFifo::default());
    let plan = allocate(SequencerCapacity::new(4).unwrap(), set(&[1, 2])).unwrap();
    let bogus = SequencerId::new(AdcModule::Adc1, 2);

    let err = controller
        .configure(bogus, plan, TriggerKind::SoftwareTriggered)
        .unwrap_err();

    assert_eq!(err, ConfigurationError::InvalidSequencerIdentity { id: bogus });
    assert_eq!(controller.hardware().writes.load(Ordering::Relaxed), 0);
    assert_eq!(controller.hardware().clears.load(Ordering::Relaxed), 0);
    assert!(!controller.is_armed(bogus));
}

#[test]
fn test_out_of_module_sequencer_rejected_by_simulator() {
    let controller = AdcController::new(SimulatedAdc::new());
    let id = SequencerId::new(AdcModule::Adc0, 4);

    let err = controller
        .configure_channels(
            id,
            SequencerCapacity::new(1).unwrap(),
            set(&[0]),
            TriggerKind::SoftwareTriggered,
        )
        .unwrap_err();

    assert!(err.is_misconfiguration());
    assert!(!err.is_transient());
    assert_eq!(
        err,
        SequencerError::Configuration(ConfigurationError::InvalidSequencerIdentity { id })
    );
}

#[test]
fn test_sample_count_mismatch() {
    let controller = AdcController::new(ShortFifo::default());
    let mut session = controller
        .configure_channels(
            SS0,
            SequencerCapacity::new(8).unwrap(),
            set(&[0, 1, 2]),
            TriggerKind::SoftwareTriggered,
        )
        .unwrap();

    let err = session.read(1).unwrap_err();

    assert_eq!(
        err,
        AcquisitionError::SampleCountMismatch {
            id: SS0,
            expected: 3,
            actual: 1
        }
    );
    // the completion condition is still acknowledged
    assert_eq!(controller.hardware().clears.load(Ordering::Relaxed), 2);
}

#[test]
fn test_empty_request_through_controller() {
    let controller = AdcController::new(SimulatedAdc::new());

    let err = controller
        .configure_channels(
            SS0,
            SequencerCapacity::new(8).unwrap(),
            ChannelSet::empty(12),
            TriggerKind::SoftwareTriggered,
        )
        .unwrap_err();

    assert_eq!(err, SequencerError::Allocation(AllocationError::EmptyRequest));
    assert!(err.is_misconfiguration());
    assert!(!controller.is_armed(SS0));
    assert!(!controller.hardware().is_enabled(SS0));
}

#[test]
fn test_timeout_is_transient() {
    let controller = AdcController::new(SimulatedAdc::new().with_latency(10));
    let mut session = controller
        .configure_channels(
            SS0,
            SequencerCapacity::new(8).unwrap(),
            set(&[3]),
            TriggerKind::SoftwareTriggered,
        )
        .unwrap();

    let err: SequencerError = session.read(2).unwrap_err().into();
    assert!(err.is_transient());
    assert!(!err.is_misconfiguration());
    assert_eq!(err.to_string(), "No conversion completed on ADC0/SS0 within 2 polls");
}

#[test]
fn test_released_session_rejects_interrupt_routing() {
    let controller = AdcController::new(SimulatedAdc::new());
    let capacity = SequencerCapacity::new(8).unwrap();
    let old = controller
        .configure_channels(SS0, capacity, set(&[1]), TriggerKind::TimerTriggered)
        .unwrap();
    let _new = controller
        .configure_channels(SS0, capacity, set(&[1]), TriggerKind::TimerTriggered)
        .unwrap();

    assert_eq!(
        old.enable_completion_interrupt(),
        Err(AcquisitionError::Released { id: SS0 })
    );
    assert!(!controller.hardware().interrupt_enabled(SS0));
}
