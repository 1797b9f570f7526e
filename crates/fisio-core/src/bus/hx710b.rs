//! HX710B 24-bit delta-sigma ADC over a two-wire clock/data interface
//!
//! The chip pulls DOUT low when a conversion is ready. The host then issues
//! 24 clock pulses and samples DOUT while the clock is high, MSB first. The
//! number of extra pulses after the 24th selects the input and rate of the
//! next conversion; one extra pulse (25 total) selects the differential
//! input at 10 Hz. Holding the clock high for more than 60 µs powers the
//! chip down, and releasing it resets it.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::debug;
use thiserror_no_std::Error;

use crate::config::BusConfig;

const DATA_BITS: u32 = 24;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("HX710B not ready after {attempts} attempts")]
    NotReady { attempts: u32 },
    #[error("HX710B data line stayed high for {waited_us} us")]
    Timeout { waited_us: u32 },
    #[error("HX710B pin access failed")]
    Pin,
}

/// Sign-extend a 24-bit two's complement value held in the low bits of `raw`.
pub const fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// One HX710B channel: a clock output, a data input and a delay provider
/// used for pulse timing.
pub struct Hx710b<SCK, DOUT, D> {
    sck: SCK,
    dout: DOUT,
    delay: D,
    config: BusConfig,
}

impl<SCK, DOUT, D> Hx710b<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    pub fn new(sck: SCK, dout: DOUT, delay: D, config: BusConfig) -> Self {
        Self {
            sck,
            dout,
            delay,
            config,
        }
    }

    /// Reset the chip and wait for its first conversion.
    ///
    /// A failure leaves the channel usable; subsequent reads will simply
    /// time out while the chip stays absent.
    pub fn init(&mut self) -> Result<(), BusError> {
        self.sck_low()?;
        self.sck_high()?;
        self.delay.delay_us(self.config.reset_pulse_us);
        self.sck_low()?;
        self.delay.delay_ms(self.config.settle_ms);

        let mut attempts = 0;
        while !self.is_ready()? && attempts < self.config.init_attempts {
            self.delay.delay_ms(self.config.init_retry_ms);
            attempts += 1;
        }
        if attempts >= self.config.init_attempts {
            return Err(BusError::NotReady { attempts });
        }

        // First conversion after reset is discarded.
        let dummy = self.read24()?;
        debug!("HX710B ready after {} retries (discarded {})", attempts, dummy);
        self.delay.delay_ms(self.config.init_retry_ms);

        Ok(())
    }

    /// DOUT low means a conversion is waiting to be clocked out.
    pub fn is_ready(&mut self) -> Result<bool, BusError> {
        self.dout.is_low().map_err(|_| BusError::Pin)
    }

    /// Clock out one conversion as a sign-extended 32-bit value.
    ///
    /// Spins on DOUT until the chip is ready or the configured ceiling
    /// elapses.
    pub fn read24(&mut self) -> Result<i32, BusError> {
        self.wait_ready()?;

        let mut raw: u32 = 0;
        for _ in 0..DATA_BITS {
            self.sck_high()?;
            self.delay.delay_us(self.config.pulse_us);
            let bit = self.dout.is_high().map_err(|_| BusError::Pin)?;
            raw = (raw << 1) | u32::from(bit);
            self.sck_low()?;
            self.delay.delay_us(self.config.pulse_us);
        }

        // 25th pulse: differential input, 10 Hz for the next conversion.
        self.sck_high()?;
        self.delay.delay_us(self.config.pulse_us);
        self.sck_low()?;

        Ok(sign_extend_24(raw))
    }

    fn wait_ready(&mut self) -> Result<(), BusError> {
        let mut waited_us = 0;
        while !self.is_ready()? {
            if waited_us >= self.config.ready_timeout_us {
                return Err(BusError::Timeout { waited_us });
            }
            self.delay.delay_us(self.config.ready_poll_us);
            waited_us += self.config.ready_poll_us;
        }
        Ok(())
    }

    fn sck_high(&mut self) -> Result<(), BusError> {
        self.sck.set_high().map_err(|_| BusError::Pin)
    }

    fn sck_low(&mut self) -> Result<(), BusError> {
        self.sck.set_low().map_err(|_| BusError::Pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{NoopDelay, SimHx710b};

    fn bus(sim: &SimHx710b) -> Hx710b<crate::testing::SimSck, crate::testing::SimDout, NoopDelay> {
        let (sck, dout) = sim.pins();
        Hx710b::new(sck, dout, NoopDelay, BusConfig::DEFAULT)
    }

    #[test]
    fn test_sign_extend_negative() {
        let raw = 0x80_0000;
        assert_eq!(sign_extend_24(raw), raw as i32 - 0x100_0000);
        assert_eq!(sign_extend_24(0xFF_FFFF), -1);
        assert_eq!(sign_extend_24(0xC0_0001), 0xC0_0001 - 0x100_0000);
    }

    #[test]
    fn test_sign_extend_positive() {
        assert_eq!(sign_extend_24(0x7F_FFFF), 8_388_607);
        assert_eq!(sign_extend_24(0x00_1234), 0x1234);
    }

    #[test]
    fn test_read24_clocks_msb_first() {
        let sim = SimHx710b::new(&[0x12_3456, -5]);
        let mut hx = bus(&sim);

        assert_eq!(hx.read24(), Ok(0x12_3456));
        assert_eq!(hx.read24(), Ok(-5));
        assert_eq!(sim.pulses_per_frame(), 25);
    }

    #[test]
    fn test_read24_times_out_when_never_ready() {
        let sim = SimHx710b::new(&[42]);
        sim.set_ready(false);
        let mut hx = bus(&sim);

        assert_eq!(
            hx.read24(),
            Err(BusError::Timeout {
                waited_us: BusConfig::DEFAULT.ready_timeout_us
            })
        );
    }

    #[test]
    fn test_init_discards_first_conversion() {
        let sim = SimHx710b::new(&[999, 7]);
        let mut hx = bus(&sim);

        assert_eq!(hx.init(), Ok(()));
        assert_eq!(sim.frames_read(), 1);
        assert_eq!(hx.read24(), Ok(7));
    }

    #[test]
    fn test_init_reports_absent_chip() {
        let sim = SimHx710b::new(&[0]);
        sim.set_ready(false);
        let mut hx = bus(&sim);

        assert_eq!(hx.init(), Err(BusError::NotReady { attempts: 50 }));
    }
}
