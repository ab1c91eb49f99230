//! Polled Modbus RTU link engine.
//!
//! Turns a byte-oriented serial stream into checksummed, addressed
//! request/response exchanges. Frames are delimited by line silence derived
//! from the baud rate. Everything runs from a non-blocking [`RtuMaster::poll`]
//! or [`RtuSlave::poll`] called repeatedly by the host scheduler.

#![forbid(unsafe_code)]

use rtubus_core::EncodeError;
use thiserror::Error;

mod assembler;
pub mod config;
pub mod direction;
mod gateway;
pub mod handle;
mod link;
pub mod master;
pub mod port;
#[cfg(feature = "serial")]
pub mod serial;
pub mod sim;
pub mod slave;
mod stats;
pub mod transaction;

pub use config::{LinkConfig, PinLevel};
pub use direction::{DirectionControl, DirectionPin};
pub use handle::{response_channel, Response, ResponseHandle};
pub use master::{RawReply, ReplyDecoder, RtuMaster};
pub use port::{ByteStream, Clock, SystemClock};
#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialLink};
pub use slave::{exception_reply, Reply, RequestHandler, RtuSlave};
pub use transaction::{Callback, Outcome};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("direction control failed: {0:?}")]
    Direction(embedded_hal::digital::ErrorKind),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
