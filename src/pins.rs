//! Channel to pin wiring.
//!
//! The wiring of analog inputs to package pins is a fixed table, kept apart
//! from the channel to slot allocation.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::channel_set::ChannelSet;
use crate::error::AllocationError;
use crate::hardware::PinConfigurator;

/// GPIO port carrying analog inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GpioPort {
    /// Port B
    B,
    /// Port D
    D,
    /// Port E
    E,
}

/// Physical pin an analog channel is bonded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinDescriptor {
    /// GPIO port
    pub port: GpioPort,
    /// Pin number within the port
    pub pin: u8,
}

impl PinDescriptor {
    const fn new(port: GpioPort, pin: u8) -> Self {
        Self { port, pin }
    }
}

impl fmt::Display for PinDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{:?}{}", self.port, self.pin)
    }
}

/// Pin of each analog input, indexed by channel id (AIN0..AIN11).
pub const PIN_MAP: [PinDescriptor; 12] = [
    PinDescriptor::new(GpioPort::E, 3),
    PinDescriptor::new(GpioPort::E, 2),
    PinDescriptor::new(GpioPort::E, 1),
    PinDescriptor::new(GpioPort::E, 0),
    PinDescriptor::new(GpioPort::D, 3),
    PinDescriptor::new(GpioPort::D, 2),
    PinDescriptor::new(GpioPort::D, 1),
    PinDescriptor::new(GpioPort::D, 0),
    PinDescriptor::new(GpioPort::E, 5),
    PinDescriptor::new(GpioPort::E, 4),
    PinDescriptor::new(GpioPort::B, 4),
    PinDescriptor::new(GpioPort::B, 5),
];

/// Look up the pin of an analog channel.
pub fn pin_for(channel: u8) -> Option<PinDescriptor> {
    PIN_MAP.get(usize::from(channel)).copied()
}

/// Route every channel in `channels` to its analog pin.
///
/// Each affected port clock is enabled once before any of its pins are
/// touched. Fails without touching the hardware if a channel has no pin.
pub fn configure_pins<P>(configurator: &P, channels: ChannelSet) -> Result<(), AllocationError>
where
    P: PinConfigurator + ?Sized,
{
    let pins = channels
        .ascending()
        .map(|channel| {
            pin_for(channel).ok_or(AllocationError::ChannelOutOfRange {
                channel,
                universe: PIN_MAP.len() as u8,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ports: BTreeSet<GpioPort> = pins.iter().map(|p| p.port).collect();
    for port in ports {
        configurator.enable_port(port);
    }

    for pin in pins {
        debug!(pin = %pin, "Routing analog input");
        configurator.enable_analog_input(pin);
    }

    Ok(())
}
