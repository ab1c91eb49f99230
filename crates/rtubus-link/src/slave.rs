//! Bus slave: answers requests addressed to its unit id.

use crate::assembler::{Assembled, WaitMode};
use crate::config::{as_ticks, LinkConfig};
use crate::direction::DirectionControl;
use crate::link::Link;
use crate::port::{ByteStream, Clock};
use crate::LinkError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use rtubus_core::encoding::Writer;
use rtubus_core::{frame, ExceptionCode, BROADCAST_ADDRESS};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Send the buffer back as the response pdu.
    Respond,
    Silent,
}

/// Processes a request pdu, optionally rewriting it in place as the response.
pub trait RequestHandler {
    fn handle(&mut self, address: u8, pdu: &mut Vec<u8>) -> Reply;
}

impl<F> RequestHandler for F
where
    F: FnMut(u8, &mut Vec<u8>) -> Reply,
{
    fn handle(&mut self, address: u8, pdu: &mut Vec<u8>) -> Reply {
        self(address, pdu)
    }
}

/// Replaces `pdu` with the exception reply to its function code.
pub fn exception_reply(pdu: &mut Vec<u8>, code: ExceptionCode) -> Reply {
    let function = frame::function_code(pdu).unwrap_or_default();
    let mut buf = [0u8; 2];
    let mut w = Writer::new(&mut buf);
    if code.encode_reply(function, &mut w).is_err() {
        return Reply::Silent;
    }
    pdu.clear();
    pdu.extend_from_slice(w.as_written());
    Reply::Respond
}

pub struct RtuSlave<S, K, H> {
    link: Link<S, K>,
    handler: H,
    yield_hook: Option<Box<dyn FnMut()>>,
}

impl<S, K, H> RtuSlave<S, K, H>
where
    S: ByteStream,
    K: Clock,
    H: RequestHandler,
{
    pub fn new(stream: S, clock: K, handler: H, config: LinkConfig) -> Result<Self, LinkError> {
        let mode = WaitMode::Bounded {
            max_step_ms: as_ticks(config.max_step_duration),
        };
        Ok(Self {
            link: Link::new(stream, clock, config, mode)?,
            handler,
            yield_hook: None,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        self.link.config()
    }

    pub fn unit_id(&self) -> u8 {
        self.link.config().unit_id
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), LinkError> {
        self.link.set_baud_rate(baud_rate)
    }

    pub fn silence_threshold(&self) -> Duration {
        self.link.silence_threshold()
    }

    pub fn set_direction_pin<P, D>(&mut self, pin: P, delay: D) -> Result<(), LinkError>
    where
        P: OutputPin + 'static,
        D: DelayNs + 'static,
    {
        self.link.set_direction_pin(pin, delay)
    }

    pub fn set_direction(&mut self, control: Box<dyn DirectionControl>) {
        self.link.set_direction(control);
    }

    /// Called on every iteration while a poll waits for the end of a frame,
    /// so the host can run other work. Without a hook the wait spins.
    pub fn set_yield_hook(&mut self, hook: impl FnMut() + 'static) {
        self.yield_hook = Some(Box::new(hook));
    }

    pub fn poll_frequency(&self) -> f32 {
        self.link.poll_frequency()
    }

    /// One scheduler tick. Waits inside the call for the frame to finish, but
    /// never longer than the configured step duration.
    pub fn poll(&mut self) -> Result<(), LinkError> {
        let unit_id = self.unit_id();
        let accept = |address: u8| address == BROADCAST_ADDRESS || address == unit_id;

        let mut spin = std::hint::spin_loop;
        let yield_now: &mut dyn FnMut() = match self.yield_hook.as_mut() {
            Some(hook) => &mut **hook,
            None => &mut spin,
        };

        let Assembled::Frame { address, mut pdu } = self.link.next_frame(accept, yield_now)?
        else {
            return Ok(());
        };

        let reply = self.handler.handle(address, &mut pdu);
        if address == BROADCAST_ADDRESS {
            debug!(function = ?frame::function_code(&pdu), "broadcast request processed");
        } else if reply == Reply::Respond {
            if pdu.is_empty() {
                debug!(unit_id, "handler produced an empty response, not replying");
            } else {
                self.link.raw_send(unit_id, &pdu)?;
            }
        }
        self.link.record_dispatch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{exception_reply, Reply, RtuSlave};
    use crate::config::LinkConfig;
    use crate::sim::{ManualClock, SimStream};
    use rtubus_core::frame;
    use rtubus_core::ExceptionCode;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn exception_reply_rewrites_pdu() {
        let mut pdu = vec![0x03, 0x00, 0x10, 0x00, 0x01];
        assert_eq!(
            exception_reply(&mut pdu, ExceptionCode::IllegalDataAddress),
            Reply::Respond
        );
        assert_eq!(pdu, vec![0x83, 0x02]);
    }

    #[test]
    fn answers_with_own_unit_id() {
        let stream = SimStream::new();
        let clock = ManualClock::new();
        let handler = |_address: u8, pdu: &mut Vec<u8>| {
            *pdu = vec![0x03, 0x02, 0x00, 0x2A];
            Reply::Respond
        };
        let mut slave = RtuSlave::new(
            stream.clone(),
            clock.clone(),
            handler,
            LinkConfig::default().with_unit_id(3).with_baud_rate(9600),
        )
        .unwrap();
        let tick = clock.clone();
        slave.set_yield_hook(move || tick.advance(1));

        stream.inject_frame(3, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        clock.advance(10);
        slave.poll().unwrap();

        assert_eq!(
            stream.take_written(),
            frame::encode_frame_vec(3, &[0x03, 0x02, 0x00, 0x2A]).unwrap()
        );
    }

    #[test]
    fn other_units_and_bad_checksums_are_ignored() {
        let stream = SimStream::new();
        let clock = ManualClock::new();
        let calls = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&calls);
        let mut slave = RtuSlave::new(
            stream.clone(),
            clock.clone(),
            move |_address: u8, _pdu: &mut Vec<u8>| {
                seen.set(seen.get() + 1);
                Reply::Respond
            },
            LinkConfig::default().with_unit_id(3),
        )
        .unwrap();
        let tick = clock.clone();
        slave.set_yield_hook(move || tick.advance(1));

        stream.inject_frame(4, &[0x03, 0x00, 0x00, 0x00, 0x01]);
        clock.advance(10);
        slave.poll().unwrap();
        stream.inject(&[0x03, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00]);
        clock.advance(10);
        slave.poll().unwrap();

        assert_eq!(stream.pending(), 0);
        assert_eq!(calls.get(), 0);
        assert!(stream.take_written().is_empty());
    }

    #[test]
    fn silent_handler_sends_nothing() {
        let stream = SimStream::new();
        let clock = ManualClock::new();
        let mut slave = RtuSlave::new(
            stream.clone(),
            clock.clone(),
            |_address: u8, _pdu: &mut Vec<u8>| Reply::Silent,
            LinkConfig::default().with_unit_id(3),
        )
        .unwrap();
        let tick = clock.clone();
        slave.set_yield_hook(move || tick.advance(1));

        stream.inject_frame(3, &[0x08, 0x00, 0x00]);
        clock.advance(10);
        slave.poll().unwrap();
        assert!(stream.take_written().is_empty());
    }
}
