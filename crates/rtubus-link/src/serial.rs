//! [`ByteStream`] over a native serial port.

use crate::port::ByteStream;
use crate::LinkError;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, StopBits};

#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Bound on a single blocking read. Reads only happen for bytes the
    /// driver already reports as buffered, so this is a safety net.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(100),
        }
    }
}

pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud_rate: u32, config: &SerialConfig) -> Result<Self, LinkError> {
        let port = tokio_serial::new(path, baud_rate)
            .parity(config.parity)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .flow_control(config.flow_control)
            .timeout(config.read_timeout)
            .open()
            .map_err(|err| {
                LinkError::Io(io::Error::other(format!(
                    "failed to open serial port '{path}': {err}"
                )))
            })?;
        Ok(Self::from_port(port))
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Line speed the port is running at, for `set_baud_rate`.
    pub fn baud_rate(&self) -> Result<u32, LinkError> {
        Ok(self.port.baud_rate().map_err(io::Error::from)?)
    }

    pub fn into_inner(self) -> Box<dyn SerialPort> {
        self.port
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.port.name())
            .finish()
    }
}

impl ByteStream for SerialLink {
    fn available(&mut self) -> io::Result<usize> {
        let pending = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(pending as usize)
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.port.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut self.port, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.port)
    }
}
