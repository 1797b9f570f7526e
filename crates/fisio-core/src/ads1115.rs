//! ADS1115 16-bit I2C ADC in single-shot mode.
//!
//! Each read writes the config register with the OS bit set, polls until the
//! conversion finishes and reads the conversion register. Conversions run at
//! 860 SPS with the comparator disabled.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use thiserror_no_std::Error;

use crate::config::AdcGain;
use crate::hal::ExternalAdc;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const OS_SINGLE: u16 = 0x8000;
const MUX_SINGLE_0: u16 = 0x4000;
const MODE_SINGLE_SHOT: u16 = 0x0100;
const DR_860SPS: u16 = 0x00E0;
const COMP_DISABLE: u16 = 0x0003;

/// One conversion at 860 SPS takes ~1.2 ms; give up well after that.
const POLL_US: u32 = 100;
const POLL_ATTEMPTS: u32 = 50;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ads1115Error<E> {
    #[error("I2C transfer failed: {0:?}")]
    I2c(E),
    #[error("ADS1115 conversion did not complete")]
    ConversionTimeout,
    #[error("ADS1115 channel {0} out of range")]
    InvalidChannel(u8),
    #[error("ADS1115 used before begin()")]
    NotStarted,
}

const fn pga_bits(gain: AdcGain) -> u16 {
    let pga = match gain {
        AdcGain::TwoThirds => 0b000,
        AdcGain::One => 0b001,
        AdcGain::Two => 0b010,
        AdcGain::Four => 0b011,
        AdcGain::Eight => 0b100,
        AdcGain::Sixteen => 0b101,
    };
    pga << 9
}

pub struct Ads1115<I, D> {
    i2c: I,
    delay: D,
    gain: AdcGain,
    address: Option<u8>,
}

impl<I: I2c, D: DelayNs> Ads1115<I, D> {
    pub const fn new(i2c: I, delay: D, gain: AdcGain) -> Self {
        Self {
            i2c,
            delay,
            gain,
            address: None,
        }
    }

    pub const fn gain(&self) -> AdcGain {
        self.gain
    }

    fn config_word(&self, channel: u8) -> u16 {
        OS_SINGLE
            | MUX_SINGLE_0
            | (u16::from(channel) << 12)
            | pga_bits(self.gain)
            | MODE_SINGLE_SHOT
            | DR_860SPS
            | COMP_DISABLE
    }

    fn read_register(&mut self, address: u8, reg: u8) -> Result<u16, Ads1115Error<I::Error>> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(address, &[reg], &mut buf)
            .map_err(Ads1115Error::I2c)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_register(
        &mut self,
        address: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), Ads1115Error<I::Error>> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(address, &[reg, hi, lo])
            .map_err(Ads1115Error::I2c)
    }
}

impl<I: I2c, D: DelayNs> ExternalAdc for Ads1115<I, D> {
    type Error = Ads1115Error<I::Error>;

    fn begin(&mut self, address: u8) -> Result<(), Self::Error> {
        // Reading the config register proves the chip acknowledges.
        self.read_register(address, REG_CONFIG)?;
        self.address = Some(address);
        Ok(())
    }

    fn read_single_ended(&mut self, channel: u8) -> Result<i16, Self::Error> {
        if channel > 3 {
            return Err(Ads1115Error::InvalidChannel(channel));
        }
        let address = self.address.ok_or(Ads1115Error::NotStarted)?;

        let config = self.config_word(channel);
        self.write_register(address, REG_CONFIG, config)?;

        let mut attempts = 0;
        while self.read_register(address, REG_CONFIG)? & OS_SINGLE == 0 {
            attempts += 1;
            if attempts >= POLL_ATTEMPTS {
                return Err(Ads1115Error::ConversionTimeout);
            }
            self.delay.delay_us(POLL_US);
        }

        let raw = self.read_register(address, REG_CONVERSION)?;
        Ok(raw as i16)
    }

    fn compute_volts(&self, code: i16) -> f32 {
        f32::from(code) * self.gain.full_scale_volts() / 32_768.0
    }
}
