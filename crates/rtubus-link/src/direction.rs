//! Half-duplex transceiver direction control.

use crate::config::PinLevel;
use crate::LinkError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, OutputPin};
use std::time::Duration;

/// Switches a shared-media transceiver between transmit and receive.
pub trait DirectionControl {
    fn set_transmit(&mut self) -> Result<(), LinkError>;
    fn set_receive(&mut self) -> Result<(), LinkError>;
}

/// Direction line driven by a GPIO, with a settling delay after asserting transmit.
#[derive(Debug)]
pub struct DirectionPin<P, D> {
    pin: P,
    delay: D,
    transmit_level: PinLevel,
    settle: Duration,
}

impl<P: OutputPin, D: DelayNs> DirectionPin<P, D> {
    /// Creates the control and drives the pin to receive.
    pub fn new(
        pin: P,
        delay: D,
        transmit_level: PinLevel,
        settle: Duration,
    ) -> Result<Self, LinkError> {
        let mut control = Self {
            pin,
            delay,
            transmit_level,
            settle,
        };
        control.set_receive()?;
        Ok(control)
    }

    pub fn into_parts(self) -> (P, D) {
        (self.pin, self.delay)
    }

    fn drive(&mut self, level: PinLevel) -> Result<(), LinkError> {
        let result = match level {
            PinLevel::High => self.pin.set_high(),
            PinLevel::Low => self.pin.set_low(),
        };
        result.map_err(|err| LinkError::Direction(err.kind()))
    }
}

impl<P: OutputPin, D: DelayNs> DirectionControl for DirectionPin<P, D> {
    fn set_transmit(&mut self) -> Result<(), LinkError> {
        self.drive(self.transmit_level)?;
        if !self.settle.is_zero() {
            let micros = u32::try_from(self.settle.as_micros()).unwrap_or(u32::MAX);
            self.delay.delay_us(micros);
        }
        Ok(())
    }

    fn set_receive(&mut self) -> Result<(), LinkError> {
        let receive_level = match self.transmit_level {
            PinLevel::High => PinLevel::Low,
            PinLevel::Low => PinLevel::High,
        };
        self.drive(receive_level)
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectionControl, DirectionPin};
    use crate::config::PinLevel;
    use crate::sim::{SimDelay, SimPin};
    use std::time::Duration;

    #[test]
    fn starts_in_receive_and_settles_on_transmit() {
        let pin = SimPin::new();
        let delay = SimDelay::new();
        let mut control = DirectionPin::new(
            pin.clone(),
            delay.clone(),
            PinLevel::High,
            Duration::from_millis(1),
        )
        .unwrap();
        control.set_transmit().unwrap();
        control.set_receive().unwrap();

        assert_eq!(pin.history(), vec![false, true, false]);
        assert_eq!(delay.total(), Duration::from_millis(1));
    }

    #[test]
    fn inverted_polarity_drives_low_for_transmit() {
        let pin = SimPin::new();
        let mut control =
            DirectionPin::new(pin.clone(), SimDelay::new(), PinLevel::Low, Duration::ZERO)
                .unwrap();
        control.set_transmit().unwrap();
        assert_eq!(pin.history(), vec![true, false]);
    }
}
