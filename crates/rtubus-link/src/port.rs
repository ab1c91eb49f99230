//! Byte stream and clock seams the link engine is driven through.

use std::io;
use std::time::Instant;

/// A buffered, non-blocking serial byte source and sink.
///
/// The engine only calls [`ByteStream::read_byte`] for bytes that
/// [`ByteStream::available`] has already reported.
pub trait ByteStream {
    /// Number of received bytes waiting to be read.
    fn available(&mut self) -> io::Result<usize>;

    /// Read the oldest buffered byte.
    fn read_byte(&mut self) -> io::Result<u8>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until everything written has physically left the port.
    fn flush(&mut self) -> io::Result<()>;
}

impl<T: ByteStream + ?Sized> ByteStream for &mut T {
    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Box<T> {
    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        (**self).read_byte()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Millisecond time source. Values wrap at `u32::MAX`; the engine only ever
/// compares them with `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// Wall clock counting milliseconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation is the intended wraparound.
        self.origin.elapsed().as_millis() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, SystemClock};

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now_ms().wrapping_sub(first) >= 2);
    }
}
