use crate::assembler::{Assembled, FrameAssembler, WaitMode};
use crate::config::LinkConfig;
use crate::direction::{DirectionControl, DirectionPin};
use crate::gateway::Gateway;
use crate::port::{ByteStream, Clock};
use crate::stats::PollStats;
use crate::LinkError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use rtubus_core::timing;
use std::time::Duration;

/// State shared by both bus roles: the wire, the clock and frame assembly.
pub(crate) struct Link<S, K> {
    gateway: Gateway<S>,
    clock: K,
    assembler: FrameAssembler,
    stats: PollStats,
    config: LinkConfig,
}

impl<S: ByteStream, K: Clock> Link<S, K> {
    pub(crate) fn new(
        stream: S,
        clock: K,
        config: LinkConfig,
        mode: WaitMode,
    ) -> Result<Self, LinkError> {
        config.validate()?;
        let silence = config.silence_threshold()?;
        let assembler = FrameAssembler::new(silence, config.max_frame_len, mode);
        Ok(Self {
            gateway: Gateway::new(stream),
            clock,
            assembler,
            stats: PollStats::default(),
            config,
        })
    }

    pub(crate) fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub(crate) fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    pub(crate) fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), LinkError> {
        let silence = timing::silence_threshold(baud_rate)
            .ok_or(LinkError::InvalidConfig("baud rate must be non-zero"))?;
        self.assembler.set_silence(silence);
        self.config.baud_rate = Some(baud_rate);
        Ok(())
    }

    pub(crate) fn silence_threshold(&self) -> Duration {
        self.assembler.silence()
    }

    pub(crate) fn set_direction_pin<P, D>(&mut self, pin: P, delay: D) -> Result<(), LinkError>
    where
        P: OutputPin + 'static,
        D: DelayNs + 'static,
    {
        let control = DirectionPin::new(
            pin,
            delay,
            self.config.transmit_level,
            self.config.settle_delay,
        )?;
        self.set_direction(Box::new(control));
        Ok(())
    }

    pub(crate) fn set_direction(&mut self, control: Box<dyn DirectionControl>) {
        self.gateway.set_direction(Some(control));
    }

    pub(crate) fn next_frame(
        &mut self,
        accept: impl FnOnce(u8) -> bool,
        yield_now: &mut dyn FnMut(),
    ) -> Result<Assembled, LinkError> {
        self.assembler
            .poll(self.gateway.stream_mut(), &self.clock, accept, yield_now)
    }

    pub(crate) fn raw_send(&mut self, address: u8, pdu: &[u8]) -> Result<(), LinkError> {
        self.gateway.raw_send(address, pdu)
    }

    pub(crate) fn record_dispatch(&mut self) {
        let now = self.clock.now_ms();
        self.stats.record(now);
    }

    pub(crate) fn poll_frequency(&self) -> f32 {
        self.stats.frequency()
    }
}
