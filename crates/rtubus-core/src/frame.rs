//! RTU frame layout: `[address][pdu..][crc hi][crc lo]`.

use crate::crc::crc16;
use crate::encoding::Writer;
use crate::exception::EXCEPTION_FLAG;
use crate::{DecodeError, EncodeError};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Requests sent here reach every slave and are never answered.
pub const BROADCAST_ADDRESS: u8 = 0;
pub const CHECKSUM_LEN: usize = 2;
pub const MAX_FRAME_LEN: usize = 256;
pub const MAX_PDU_LEN: usize = MAX_FRAME_LEN - 1 - CHECKSUM_LEN;

pub fn encode_frame(w: &mut Writer<'_>, address: u8, pdu: &[u8]) -> Result<(), EncodeError> {
    if pdu.is_empty() {
        return Err(EncodeError::EmptyPdu);
    }
    if pdu.len() > MAX_PDU_LEN {
        return Err(EncodeError::FrameTooLong);
    }
    if w.remaining() < encoded_len(pdu) {
        return Err(EncodeError::BufferTooSmall);
    }

    w.write_u8(address)?;
    w.write_all(pdu)?;
    w.write_be_u16(crc16(address, pdu))
}

/// Number of bytes `encode_frame` writes for `pdu`.
pub const fn encoded_len(pdu: &[u8]) -> usize {
    1 + pdu.len() + CHECKSUM_LEN
}

#[cfg(feature = "alloc")]
pub fn encode_frame_vec(address: u8, pdu: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut frame = alloc::vec![0u8; encoded_len(pdu)];
    let mut w = Writer::new(&mut frame);
    encode_frame(&mut w, address, pdu)?;
    Ok(frame)
}

/// Splits the bytes following the address into the pdu and its trailing check.
pub fn split_checksum(body: &[u8]) -> Result<(&[u8], u16), DecodeError> {
    if body.len() < CHECKSUM_LEN {
        return Err(DecodeError::TooShort);
    }
    let (pdu, check) = body.split_at(body.len() - CHECKSUM_LEN);
    Ok((pdu, u16::from_be_bytes([check[0], check[1]])))
}

/// Validates the check trailing `body` against `address` and returns the pdu.
///
/// An empty pdu is valid here; only the two checksum bytes are required.
pub fn verify(address: u8, body: &[u8]) -> Result<&[u8], DecodeError> {
    let (pdu, got) = split_checksum(body)?;
    let expected = crc16(address, pdu);
    if expected != got {
        return Err(DecodeError::InvalidCrc { expected, got });
    }
    Ok(pdu)
}

/// Function code of `pdu` with the exception flag cleared.
pub fn function_code(pdu: &[u8]) -> Option<u8> {
    pdu.first().map(|byte| byte & !EXCEPTION_FLAG)
}

/// True when `reply` carries the function code `request` was sent with,
/// either as a normal or an exception reply.
pub fn is_reply_to(reply: &[u8], request: &[u8]) -> bool {
    match (function_code(reply), request.first()) {
        (Some(got), Some(&sent)) => got == sent,
        _ => false,
    }
}
