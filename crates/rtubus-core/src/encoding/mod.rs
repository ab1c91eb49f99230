use crate::EncodeError;

/// A byte writer that encodes into a caller-owned buffer.
#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn as_written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.write_all(&[value])
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        if self.remaining() < data.len() {
            return Err(EncodeError::BufferTooSmall);
        }
        let end = self.pos + data.len();
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    /// Writes `value` high byte first, the order RTU checksums travel in.
    pub fn write_be_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_all(&value.to_be_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::Writer;
    use crate::EncodeError;

    #[test]
    fn writer_tracks_position() {
        let mut buf = [0u8; 4];
        let mut w = Writer::new(&mut buf);
        w.write_u8(0x11).unwrap();
        w.write_be_u16(0xC5CD).unwrap();
        assert_eq!(w.position(), 3);
        assert_eq!(w.as_written(), &[0x11, 0xC5, 0xCD]);
    }

    #[test]
    fn writer_rejects_overflow_without_partial_write() {
        let mut buf = [0u8; 2];
        let mut w = Writer::new(&mut buf);
        w.write_u8(0x01).unwrap();
        assert_eq!(w.write_be_u16(0x1234).unwrap_err(), EncodeError::BufferTooSmall);
        assert_eq!(w.as_written(), &[0x01]);
    }
}
