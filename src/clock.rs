use embassy_time::Instant;
use fisio_core::hal::Clock;

/// Device clock backed by the embassy time driver.
///
/// Truncated to 32 bits, so micros wrap after ~71 minutes; every consumer
/// compares with `wrapping_sub`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_micros(&self) -> u32 {
        Instant::now().as_micros() as u32
    }

    fn now_millis(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}
