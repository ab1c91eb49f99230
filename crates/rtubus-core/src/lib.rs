//! Modbus RTU wire primitives in pure Rust.
//!
//! `rtubus-core` provides the checksum, line timing and frame layout used by
//! the polled link engine in `rtubus-link`. It is `no_std`-compatible; the
//! `alloc` feature adds owned frame helpers.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod crc;
pub mod encoding;
pub mod error;
pub mod exception;
pub mod frame;
pub mod timing;

pub use crc::crc16;
pub use error::{DecodeError, EncodeError};
pub use exception::ExceptionCode;
pub use frame::BROADCAST_ADDRESS;
