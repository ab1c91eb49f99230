use crate::direction::DirectionControl;
use crate::port::ByteStream;
use crate::LinkError;
use rtubus_core::frame;
use tracing::{trace, warn};

/// Puts checksummed frames on the wire, toggling the direction line around them.
pub(crate) struct Gateway<S> {
    stream: S,
    direction: Option<Box<dyn DirectionControl>>,
}

impl<S: ByteStream> Gateway<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            direction: None,
        }
    }

    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub(crate) fn set_direction(&mut self, direction: Option<Box<dyn DirectionControl>>) {
        self.direction = direction;
    }

    pub(crate) fn raw_send(&mut self, address: u8, pdu: &[u8]) -> Result<(), LinkError> {
        let bytes = frame::encode_frame_vec(address, pdu)?;

        if let Some(direction) = self.direction.as_mut() {
            direction.set_transmit()?;
        }
        let written = self
            .stream
            .write_all(&bytes)
            .and_then(|()| self.stream.flush());
        let restored = match self.direction.as_mut() {
            Some(direction) => direction.set_receive(),
            None => Ok(()),
        };
        written?;
        // The frame is already on the wire.
        if let Err(err) = restored {
            warn!(unit_id = address, error = %err, "failed to return direction line to receive");
        }

        trace!(unit_id = address, pdu_len = pdu.len(), "sent modbus rtu frame");
        Ok(())
    }
}
