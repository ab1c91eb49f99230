use crate::encoding::Writer;
use crate::EncodeError;

/// Bit set in the function byte of an exception reply.
pub const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    Unknown(u8),
}

impl ExceptionCode {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetFailedToRespond,
            other => Self::Unknown(other),
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::ServerDeviceFailure => 0x04,
            Self::Acknowledge => 0x05,
            Self::ServerDeviceBusy => 0x06,
            Self::MemoryParityError => 0x08,
            Self::GatewayPathUnavailable => 0x0A,
            Self::GatewayTargetFailedToRespond => 0x0B,
            Self::Unknown(raw) => raw,
        }
    }

    /// Reads the exception carried by a reply PDU, if its function byte is flagged.
    pub fn from_reply(pdu: &[u8]) -> Option<Self> {
        match pdu {
            [function, code, ..] if function & EXCEPTION_FLAG != 0 => Some(Self::from_u8(*code)),
            [function] if function & EXCEPTION_FLAG != 0 => Some(Self::Unknown(0)),
            _ => None,
        }
    }

    /// Writes the two-byte exception PDU answering `function_code`.
    pub fn encode_reply(self, function_code: u8, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(function_code | EXCEPTION_FLAG)?;
        w.write_u8(self.as_u8())
    }
}
