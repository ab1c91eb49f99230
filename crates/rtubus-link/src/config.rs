use crate::LinkError;
use rtubus_core::frame;
use rtubus_core::timing;
use std::time::Duration;

/// Line level that puts a half-duplex transceiver into transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinLevel {
    #[default]
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Bus address answered by a slave. Ignored by masters.
    pub unit_id: u8,
    /// Line speed used for the silence threshold. `None` keeps the 2 ms minimum.
    pub baud_rate: Option<u32>,
    pub response_timeout: Duration,
    /// Upper bound on one slave poll spent waiting for the line to go quiet.
    pub max_step_duration: Duration,
    pub max_frame_len: usize,
    pub settle_delay: Duration,
    pub transmit_level: PinLevel,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            unit_id: 1,
            baud_rate: None,
            response_timeout: Duration::from_millis(1000),
            max_step_duration: Duration::from_millis(100),
            max_frame_len: frame::MAX_FRAME_LEN,
            settle_delay: Duration::from_millis(1),
            transmit_level: PinLevel::High,
        }
    }
}

impl LinkConfig {
    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = Some(baud_rate);
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_max_step_duration(mut self, max_step_duration: Duration) -> Self {
        self.max_step_duration = max_step_duration;
        self
    }

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_transmit_level(mut self, transmit_level: PinLevel) -> Self {
        self.transmit_level = transmit_level;
        self
    }

    /// Silence threshold for the configured baud rate.
    pub fn silence_threshold(&self) -> Result<Duration, LinkError> {
        match self.baud_rate {
            None => Ok(timing::MIN_SILENCE),
            Some(baud) => timing::silence_threshold(baud)
                .ok_or(LinkError::InvalidConfig("baud rate must be non-zero")),
        }
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        self.silence_threshold()?;
        if self.max_frame_len < 1 + frame::CHECKSUM_LEN {
            return Err(LinkError::InvalidConfig(
                "rtu max frame length must be at least 3 bytes",
            ));
        }
        if self.unit_id == rtubus_core::BROADCAST_ADDRESS {
            return Err(LinkError::InvalidConfig("unit id 0 is the broadcast address"));
        }
        Ok(())
    }
}

/// Converts a configured duration to clock ticks, saturating at `u32::MAX`.
pub(crate) fn as_ticks(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{LinkConfig, PinLevel};
    use crate::LinkError;
    use std::time::Duration;

    #[test]
    fn defaults_match_rtu_driver_constants() {
        let config = LinkConfig::default();
        assert_eq!(config.response_timeout, Duration::from_millis(1000));
        assert_eq!(config.max_step_duration, Duration::from_millis(100));
        assert_eq!(config.max_frame_len, 256);
        assert_eq!(config.transmit_level, PinLevel::High);
        assert_eq!(config.silence_threshold().unwrap(), Duration::from_millis(2));
    }

    #[test]
    fn builder_sets_fields() {
        let config = LinkConfig::default()
            .with_unit_id(3)
            .with_baud_rate(9600)
            .with_transmit_level(PinLevel::Low)
            .with_settle_delay(Duration::ZERO);
        assert_eq!(config.unit_id, 3);
        assert_eq!(config.silence_threshold().unwrap(), Duration::from_millis(4));
        assert_eq!(config.settle_delay, Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_baud_and_tiny_frames() {
        assert!(matches!(
            LinkConfig::default().with_baud_rate(0).validate(),
            Err(LinkError::InvalidConfig(_))
        ));
        assert!(matches!(
            LinkConfig::default().with_max_frame_len(2).validate(),
            Err(LinkError::InvalidConfig(_))
        ));
        assert!(matches!(
            LinkConfig::default().with_unit_id(0).validate(),
            Err(LinkError::InvalidConfig(_))
        ));
    }
}
