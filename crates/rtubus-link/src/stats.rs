//! Rolling dispatch-rate measurement for diagnostics.

const WINDOW: u32 = 100;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PollStats {
    started: bool,
    window_start_ms: u32,
    count: u32,
    frequency: f32,
}

impl PollStats {
    pub(crate) fn record(&mut self, now_ms: u32) {
        if !self.started {
            self.started = true;
            self.window_start_ms = now_ms;
            return;
        }

        self.count += 1;
        if self.count < WINDOW {
            return;
        }
        let elapsed_ms = now_ms.wrapping_sub(self.window_start_ms);
        if elapsed_ms > 0 {
            self.frequency = self.count as f32 / (elapsed_ms as f32 / 1000.0);
        }
        self.window_start_ms = now_ms;
        self.count = 0;
    }

    /// Dispatches per second over the last complete window, 0 before one completes.
    pub(crate) fn frequency(&self) -> f32 {
        self.frequency
    }
}
