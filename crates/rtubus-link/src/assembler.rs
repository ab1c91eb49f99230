//! Silence-delimited frame assembly over a polled byte stream.

use crate::port::{ByteStream, Clock};
use crate::LinkError;
use rtubus_core::{frame, DecodeError};
use std::io;
use std::time::Duration;
use tracing::{debug, trace};

/// How a poll waits for the line to go quiet once bytes are pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitMode {
    /// Return and let a later poll look again.
    Cooperative,
    /// Spin inside the poll, yielding each iteration, for at most `max_step_ms`.
    Bounded { max_step_ms: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Discard {
    Unaddressed,
    Oversized,
    TooShort,
    Checksum,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Assembled {
    /// Nothing buffered.
    Idle,
    /// Bytes are buffered but the frame may still be arriving.
    Incomplete,
    Discarded(Discard),
    /// A checksummed frame; `pdu` excludes address and checksum.
    Frame { address: u8, pdu: Vec<u8> },
}

#[derive(Debug)]
pub(crate) struct FrameAssembler {
    observed: usize,
    last_arrival_ms: u32,
    silence_ms: u32,
    max_frame_len: usize,
    mode: WaitMode,
}

impl FrameAssembler {
    pub(crate) fn new(silence: Duration, max_frame_len: usize, mode: WaitMode) -> Self {
        Self {
            observed: 0,
            last_arrival_ms: 0,
            silence_ms: crate::config::as_ticks(silence),
            max_frame_len,
            mode,
        }
    }

    pub(crate) fn set_silence(&mut self, silence: Duration) {
        self.silence_ms = crate::config::as_ticks(silence);
    }

    pub(crate) fn silence(&self) -> Duration {
        Duration::from_millis(u64::from(self.silence_ms))
    }

    /// Runs one assembly step. `accept` decides from the address byte whether
    /// the frame is buffered or drained; `yield_now` is called on every
    /// iteration of a bounded wait.
    ///
    /// On error the assembler forgets the frame in progress.
    pub(crate) fn poll<S, K>(
        &mut self,
        stream: &mut S,
        clock: &K,
        accept: impl FnOnce(u8) -> bool,
        yield_now: &mut dyn FnMut(),
    ) -> Result<Assembled, LinkError>
    where
        S: ByteStream + ?Sized,
        K: Clock + ?Sized,
    {
        let result = self.assemble(stream, clock, accept, yield_now);
        if result.is_err() {
            self.observed = 0;
        }
        result
    }

    fn assemble<S, K>(
        &mut self,
        stream: &mut S,
        clock: &K,
        accept: impl FnOnce(u8) -> bool,
        yield_now: &mut dyn FnMut(),
    ) -> Result<Assembled, LinkError>
    where
        S: ByteStream + ?Sized,
        K: Clock + ?Sized,
    {
        self.observe(stream, clock.now_ms())?;
        if self.observed == 0 {
            return Ok(Assembled::Idle);
        }
        if !self.wait_for_silence(stream, clock, yield_now)? {
            return Ok(Assembled::Incomplete);
        }

        let remaining = self.observed - 1;
        self.observed = 0;
        let address = stream.read_byte()?;

        if !accept(address) {
            drain(stream, remaining)?;
            debug!(address, len = remaining, "discarding frame not addressed to us");
            return Ok(Assembled::Discarded(Discard::Unaddressed));
        }

        let mut body = Vec::new();
        if remaining + 1 > self.max_frame_len || body.try_reserve_exact(remaining).is_err() {
            drain(stream, remaining)?;
            debug!(address, len = remaining, "discarding oversized frame");
            return Ok(Assembled::Discarded(Discard::Oversized));
        }
        for _ in 0..remaining {
            body.push(stream.read_byte()?);
        }

        let pdu_len = match frame::verify(address, &body) {
            Ok(pdu) => pdu.len(),
            Err(DecodeError::TooShort) => {
                debug!(address, len = remaining, "discarding frame without checksum");
                return Ok(Assembled::Discarded(Discard::TooShort));
            }
            Err(err) => {
                debug!(address, error = %err, "discarding frame with bad checksum");
                return Ok(Assembled::Discarded(Discard::Checksum));
            }
        };
        body.truncate(pdu_len);
        trace!(unit_id = address, pdu_len, "received modbus rtu frame");
        Ok(Assembled::Frame { address, pdu: body })
    }

    /// Notes newly arrived bytes and when they arrived.
    fn observe<S: ByteStream + ?Sized>(&mut self, stream: &mut S, now_ms: u32) -> io::Result<()> {
        let available = stream.available()?;
        if available > self.observed {
            self.observed = available;
            self.last_arrival_ms = now_ms;
        }
        Ok(())
    }

    fn wait_for_silence<S, K>(
        &mut self,
        stream: &mut S,
        clock: &K,
        yield_now: &mut dyn FnMut(),
    ) -> io::Result<bool>
    where
        S: ByteStream + ?Sized,
        K: Clock + ?Sized,
    {
        match self.mode {
            WaitMode::Cooperative => Ok(self.is_quiet(clock.now_ms())),
            WaitMode::Bounded { max_step_ms } => {
                let step_start = clock.now_ms();
                loop {
                    let now = clock.now_ms();
                    self.observe(stream, now)?;
                    if self.is_quiet(now) {
                        return Ok(true);
                    }
                    if now.wrapping_sub(step_start) > max_step_ms {
                        trace!(pending = self.observed, "rtu frame still arriving, deferring");
                        return Ok(false);
                    }
                    yield_now();
                }
            }
        }
    }

    fn is_quiet(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_arrival_ms) >= self.silence_ms
    }
}

/// Consumes `len` confirmed bytes so the stream count stays in step.
fn drain<S: ByteStream + ?Sized>(stream: &mut S, len: usize) -> io::Result<()> {
    for _ in 0..len {
        stream.read_byte()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Assembled, Discard, FrameAssembler, WaitMode};
    use crate::port::ByteStream;
    use crate::sim::{ManualClock, SimStream};
    use std::time::Duration;

    fn cooperative() -> FrameAssembler {
        FrameAssembler::new(Duration::from_millis(4), 256, WaitMode::Cooperative)
    }

    /// Lets the assembler see what is buffered, then lets the line go quiet.
    fn settle(assembler: &mut FrameAssembler, stream: &mut SimStream, clock: &ManualClock) {
        let step = assembler.poll(stream, clock, |_| true, &mut || {}).unwrap();
        assert_eq!(step, Assembled::Incomplete);
        clock.advance(10);
    }

    #[test]
    fn waits_for_silence_before_reading() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = cooperative();

        stream.inject_frame(5, &[0x03, 0x02, 0x00, 0x2A]);
        let step = assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap();
        assert_eq!(step, Assembled::Incomplete);

        clock.advance(3);
        let step = assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap();
        assert_eq!(step, Assembled::Incomplete);

        clock.advance(1);
        let step = assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap();
        assert_eq!(
            step,
            Assembled::Frame {
                address: 5,
                pdu: vec![0x03, 0x02, 0x00, 0x2A]
            }
        );
        assert_eq!(stream.available().unwrap(), 0);
    }

    #[test]
    fn new_bytes_restart_the_silence_window() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = cooperative();

        let frame = rtubus_core::frame::encode_frame_vec(5, &[0x03, 0x02, 0x00, 0x2A]).unwrap();
        stream.inject(&frame[..3]);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Incomplete
        );
        clock.advance(3);
        stream.inject(&frame[3..]);
        clock.advance(1);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Incomplete
        );
        clock.advance(4);
        assert!(matches!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Frame { address: 5, .. }
        ));
    }

    #[test]
    fn rejected_address_is_drained() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = cooperative();

        stream.inject_frame(9, &[0x03, 0x02, 0x00, 0x2A]);
        settle(&mut assembler, &mut stream, &clock);
        let step = assembler
            .poll(&mut stream, &clock, |address| address == 5, &mut || {})
            .unwrap();
        assert_eq!(step, Assembled::Discarded(Discard::Unaddressed));
        assert_eq!(stream.available().unwrap(), 0);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Idle
        );
    }

    #[test]
    fn short_and_corrupt_frames_are_discarded() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = cooperative();

        stream.inject(&[0x05, 0x03]);
        settle(&mut assembler, &mut stream, &clock);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Discarded(Discard::TooShort)
        );

        stream.inject(&[0x05, 0x03, 0x02, 0x00, 0x2A, 0xDE, 0xAD]);
        settle(&mut assembler, &mut stream, &clock);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Discarded(Discard::Checksum)
        );
        assert_eq!(stream.available().unwrap(), 0);
    }

    #[test]
    fn checksum_only_frame_is_delivered_with_empty_pdu() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = cooperative();

        stream.inject(&[0x05]);
        stream.inject(&rtubus_core::crc16(0x05, &[]).to_be_bytes());
        settle(&mut assembler, &mut stream, &clock);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Frame {
                address: 5,
                pdu: Vec::new()
            }
        );
    }

    #[test]
    fn oversized_frames_are_drained() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = FrameAssembler::new(Duration::from_millis(2), 8, WaitMode::Cooperative);

        stream.inject_frame(5, &[0x10; 12]);
        settle(&mut assembler, &mut stream, &clock);
        assert_eq!(
            assembler.poll(&mut stream, &clock, |_| true, &mut || {}).unwrap(),
            Assembled::Discarded(Discard::Oversized)
        );
        assert_eq!(stream.available().unwrap(), 0);
    }

    #[test]
    fn bounded_wait_gives_up_at_step_ceiling() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = FrameAssembler::new(
            Duration::from_millis(4),
            256,
            WaitMode::Bounded { max_step_ms: 10 },
        );

        // A byte keeps trickling in every millisecond, so the line never goes quiet.
        let feeder = stream.clone();
        let tick = clock.clone();
        let mut yields = 0;
        stream.inject(&[0x05]);
        let step = assembler
            .poll(&mut stream, &clock, |_| true, &mut || {
                yields += 1;
                tick.advance(1);
                feeder.inject(&[0x00]);
            })
            .unwrap();
        assert_eq!(step, Assembled::Incomplete);
        assert_eq!(yields, 11);
    }

    #[test]
    fn bounded_wait_completes_within_one_step() {
        let mut stream = SimStream::new();
        let clock = ManualClock::new();
        let mut assembler = FrameAssembler::new(
            Duration::from_millis(4),
            256,
            WaitMode::Bounded { max_step_ms: 100 },
        );

        stream.inject_frame(3, &[0x06, 0x00, 0x01, 0x00, 0x2A]);
        let tick = clock.clone();
        let step = assembler
            .poll(&mut stream, &clock, |_| true, &mut || tick.advance(1))
            .unwrap();
        assert!(matches!(step, Assembled::Frame { address: 3, .. }));
    }
}
