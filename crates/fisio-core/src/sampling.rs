//! Elapsed-time sample gating for the rate-limited drivers.

/// Cooperative per-sensor rate limiter.
///
/// Call [`SampleScheduler::ready`] every loop iteration; it accepts at most
/// one sample per configured period. A late call is accepted once and the
/// period restarts from that call, so missed samples are never replayed.
#[derive(Debug, Clone, Copy)]
pub struct SampleScheduler {
    interval_us: u32,
    last_sample_us: u32,
}

impl SampleScheduler {
    pub const fn new(rate_hz: u32) -> Self {
        let rate_hz = if rate_hz == 0 { 1 } else { rate_hz };
        Self {
            interval_us: 1_000_000 / rate_hz,
            last_sample_us: 0,
        }
    }

    pub const fn interval_us(&self) -> u32 {
        self.interval_us
    }

    /// Restart the period at `now_us` without accepting a sample.
    pub fn start(&mut self, now_us: u32) {
        self.last_sample_us = now_us;
    }

    /// Returns `true` and restamps when a full period has elapsed.
    pub fn ready(&mut self, now_us: u32) -> bool {
        if now_us.wrapping_sub(self.last_sample_us) < self.interval_us {
            return false;
        }
        self.last_sample_us = now_us;
        true
    }
}
