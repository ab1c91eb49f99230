//! Bus master: sends one request at a time and matches the reply to it.

use crate::assembler::{Assembled, WaitMode};
use crate::config::{as_ticks, LinkConfig};
use crate::direction::DirectionControl;
use crate::link::Link;
use crate::port::{ByteStream, Clock};
use crate::transaction::{Outcome, PendingTransaction, Transactions};
use crate::LinkError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use rtubus_core::{frame, ExceptionCode, BROADCAST_ADDRESS};
use std::time::Duration;
use tracing::{debug, warn};

/// Interprets a checksummed reply whose function code matches the request.
pub trait ReplyDecoder {
    /// Describes what the request addressed, e.g. a register range.
    type Register;
    /// Caller state handed to the decoder and then back through the callback.
    type Context;

    fn decode(
        &mut self,
        reply: &[u8],
        request: &[u8],
        register: &Self::Register,
        context: &mut Self::Context,
    ) -> Outcome;
}

/// Decoder that keeps the raw reply pdu, reporting exception replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawReply;

impl ReplyDecoder for RawReply {
    type Register = ();
    type Context = Vec<u8>;

    fn decode(
        &mut self,
        reply: &[u8],
        _request: &[u8],
        _register: &(),
        context: &mut Vec<u8>,
    ) -> Outcome {
        context.clear();
        context.extend_from_slice(reply);
        match ExceptionCode::from_reply(reply) {
            Some(code) => Outcome::Exception(code),
            None => Outcome::Success,
        }
    }
}

pub struct RtuMaster<S, K, D: ReplyDecoder> {
    link: Link<S, K>,
    decoder: D,
    transactions: Transactions<D::Register, D::Context>,
}

impl<S, K, D> RtuMaster<S, K, D>
where
    S: ByteStream,
    K: Clock,
    D: ReplyDecoder,
{
    pub fn new(stream: S, clock: K, decoder: D, config: LinkConfig) -> Result<Self, LinkError> {
        let timeout_ms = as_ticks(config.response_timeout);
        Ok(Self {
            link: Link::new(stream, clock, config, WaitMode::Cooperative)?,
            decoder,
            transactions: Transactions::new(timeout_ms),
        })
    }

    pub fn config(&self) -> &LinkConfig {
        self.link.config()
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), LinkError> {
        self.link.set_baud_rate(baud_rate)
    }

    pub fn silence_threshold(&self) -> Duration {
        self.link.silence_threshold()
    }

    /// Drives `pin` as the transceiver direction line, using the configured
    /// polarity and settling delay.
    pub fn set_direction_pin<P, Dl>(&mut self, pin: P, delay: Dl) -> Result<(), LinkError>
    where
        P: OutputPin + 'static,
        Dl: DelayNs + 'static,
    {
        self.link.set_direction_pin(pin, delay)
    }

    pub fn set_direction(&mut self, control: Box<dyn DirectionControl>) {
        self.link.set_direction(control);
    }

    /// True while a request is waiting for its reply.
    pub fn is_busy(&self) -> bool {
        self.transactions.is_active()
    }

    pub fn pending_target(&self) -> Option<u8> {
        self.transactions.target()
    }

    pub fn poll_frequency(&self) -> f32 {
        self.link.poll_frequency()
    }

    /// Transmits the prepared `request` pdu to `address`.
    ///
    /// With `wait_response` set and a unicast address, the request, register
    /// and context are kept until the reply arrives or the response timeout
    /// passes, and `callback` then fires exactly once. Otherwise the callback
    /// is dropped unfired.
    ///
    /// Returns `Ok(false)` without touching the line when another request is
    /// still pending or `request` is empty.
    pub fn send<F>(
        &mut self,
        address: u8,
        request: Vec<u8>,
        register: D::Register,
        context: D::Context,
        callback: F,
        wait_response: bool,
    ) -> Result<bool, LinkError>
    where
        F: FnOnce(Outcome, D::Context) + 'static,
    {
        if let Some(pending) = self.transactions.target() {
            debug!(unit_id = address, pending, "modbus rtu master busy, request not sent");
            return Ok(false);
        }
        if request.is_empty() {
            debug!(unit_id = address, "no request pdu prepared");
            return Ok(false);
        }

        self.link.raw_send(address, &request)?;

        if wait_response && address != BROADCAST_ADDRESS {
            let transaction = PendingTransaction::new(
                address,
                request,
                register,
                context,
                Box::new(callback),
                self.link.now_ms(),
            );
            if let Err(rejected) = self.transactions.begin(transaction) {
                warn!(unit_id = rejected.target, "modbus rtu transaction already pending");
            }
        }
        Ok(true)
    }

    /// Times out the pending request once its deadline has passed.
    pub fn cleanup(&mut self) -> bool {
        let now = self.link.now_ms();
        self.transactions.cleanup(now)
    }

    /// One scheduler tick. Never waits for the line; a frame still arriving is
    /// picked up by a later call.
    pub fn poll(&mut self) -> Result<(), LinkError> {
        let target = self.transactions.target();
        let accept = |address: u8| match target {
            Some(target) => address == BROADCAST_ADDRESS || address == target,
            None => false,
        };

        match self.link.next_frame(accept, &mut || {})? {
            Assembled::Incomplete => {}
            Assembled::Idle | Assembled::Discarded(_) => {
                self.cleanup();
            }
            Assembled::Frame { address, pdu } => {
                self.dispatch(address, pdu);
                self.link.record_dispatch();
                self.cleanup();
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, address: u8, reply: Vec<u8>) {
        let Some(mut pending) = self.transactions.take() else {
            debug!(unit_id = address, "reply without pending request");
            return;
        };

        let outcome = if frame::is_reply_to(&reply, &pending.request) {
            self.decoder.decode(
                &reply,
                &pending.request,
                &pending.register,
                &mut pending.context,
            )
        } else {
            Outcome::UnexpectedFunction {
                expected: pending.request.first().copied().unwrap_or_default(),
                received: reply.first().copied(),
            }
        };
        pending.resolve(outcome);
    }
}
