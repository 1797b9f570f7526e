//! Seams to the hardware that the core pipeline consumes.
//!
//! Digital pins and delays come straight from `embedded-hal`. Everything
//! else the drivers need (time base, the external I2C ADC, on-chip analog
//! inputs and the outbound byte sink) is described here so the firmware,
//! the simulator and the tests can each plug in their own implementation.

use core::fmt::Debug;

/// Free-running device clock.
///
/// Both counters are allowed to wrap; consumers compare them with
/// `wrapping_sub`.
pub trait Clock {
    /// Microseconds since boot.
    fn now_micros(&self) -> u32;

    /// Milliseconds since boot. Used as the frame timestamp.
    fn now_millis(&self) -> u32;
}

impl<C: Clock> Clock for &C {
    fn now_micros(&self) -> u32 {
        (**self).now_micros()
    }

    fn now_millis(&self) -> u32 {
        (**self).now_millis()
    }
}

/// External 16-bit ADC attached over I2C (ADS1115 class).
pub trait ExternalAdc {
    type Error: Debug;

    /// Probe the converter at `address` and apply its configuration.
    fn begin(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Run a single-ended conversion on `channel` and return the signed code.
    fn read_single_ended(&mut self, channel: u8) -> Result<i16, Self::Error>;

    /// Convert a code into volts using the converter's configured range.
    fn compute_volts(&self, code: i16) -> f32;
}

/// On-chip analog input pin.
pub trait AnalogInput {
    type Error: Debug;

    /// Read the raw conversion code.
    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Byte sink that receives complete frames.
pub trait Transport {
    type Error: Debug;

    /// Deliver one complete frame.
    fn send(&mut self, frame: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;
}
