//! Deterministic stand-ins for the serial port, clock and direction line.
//!
//! Every type here is a cheap shared handle: clone it, hand one copy to the
//! link and keep the other to inject traffic or inspect what was sent.

use crate::port::{ByteStream, Clock};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use rtubus_core::crc16;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct SimBuffers {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    flushes: usize,
}

/// In-memory byte stream. Injected bytes become readable immediately.
#[derive(Debug, Clone, Default)]
pub struct SimStream {
    buffers: Arc<Mutex<SimBuffers>>,
}

impl SimStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimBuffers> {
        self.buffers.lock().expect("sim stream lock poisoned")
    }

    /// Queue raw bytes as if they had arrived on the line.
    pub fn inject(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Queue a correctly checksummed frame.
    pub fn inject_frame(&self, address: u8, pdu: &[u8]) {
        let mut buffers = self.lock();
        buffers.rx.push_back(address);
        buffers.rx.extend(pdu.iter().copied());
        buffers.rx.extend(crc16(address, pdu).to_be_bytes());
    }

    /// Unread received bytes.
    pub fn pending(&self) -> usize {
        self.lock().rx.len()
    }

    /// Everything written since the last call.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().tx)
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }
}

impl ByteStream for SimStream {
    fn available(&mut self) -> io::Result<usize> {
        Ok(self.pending())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.lock()
            .rx
            .pop_front()
            .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.lock().tx.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now_ms: u32) -> Self {
        let clock = Self::default();
        clock.set(now_ms);
        clock
    }

    pub fn set(&self, now_ms: u32) {
        self.now_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u32) {
        // fetch_add wraps, like a hardware millisecond counter.
        self.now_ms.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

/// Output pin recording every level it is driven to (`true` = high).
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    history: Arc<Mutex<Vec<bool>>>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.lock().expect("sim pin lock poisoned").clone()
    }

    fn record(&self, high: bool) {
        self.history.lock().expect("sim pin lock poisoned").push(high);
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.record(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.record(true);
        Ok(())
    }
}

/// Delay that returns at once and totals the time it was asked to wait.
#[derive(Debug, Clone, Default)]
pub struct SimDelay {
    total_ns: Arc<AtomicU64>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Relaxed))
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.fetch_add(u64::from(ns), Ordering::Relaxed);
    }
}
