//! Build-time configuration of a unit.
//!
//! Every struct has a `const DEFAULT` matching the reference hardware so the
//! firmware can build its configuration in a `const` context, and derives
//! `serde` so host tooling can describe units in the same shape.

use serde::{Deserialize, Serialize};

use crate::protocol::DeviceIdentity;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    /// Per-unit identity embedded in every frame.
    pub device_id: u16,
    /// Baud rate of the UART carrying the frame stream.
    pub serial_baud: u32,
}

impl DeviceConfig {
    pub const DEFAULT: Self = Self {
        device_id: 0x0001,
        serial_baud: 115_200,
    };

    pub const fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.device_id)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Timing of the HX710B two-wire bus.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Width of each clock phase.
    pub pulse_us: u32,
    /// Clock-high time of the power-down/reset pulse.
    pub reset_pulse_us: u32,
    /// Settle time after the reset pulse.
    pub settle_ms: u32,
    /// Readiness checks performed by `init`.
    pub init_attempts: u32,
    pub init_retry_ms: u32,
    /// Ceiling on how long a read waits for the data line to drop.
    pub ready_timeout_us: u32,
    /// Interval between data line polls while waiting.
    pub ready_poll_us: u32,
}

impl BusConfig {
    pub const DEFAULT: Self = Self {
        pulse_us: 1,
        reset_pulse_us: 100,
        settle_ms: 100,
        init_attempts: 50,
        init_retry_ms: 10,
        ready_timeout_us: 500_000,
        ready_poll_us: 10,
    };
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Conversion chain of the MPS20N0040D + HX710B pressure channels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PressureConfig {
    pub counts_to_kpa: f32,
    pub division_factor: f32,
    /// `flow = flow_constant * sqrt(|kPa|)`.
    pub flow_constant: f32,
    /// Pressures below this magnitude (kPa) yield zero flow.
    pub pressure_threshold: f32,
    /// Flows below this magnitude are forced to zero and never integrated.
    pub flow_threshold: f32,
    /// Quiescent readings averaged into the zero offset.
    pub calibration_samples: u32,
}

impl PressureConfig {
    pub const DEFAULT: Self = Self {
        counts_to_kpa: 0.000_028,
        division_factor: 14.388,
        flow_constant: 6.77,
        pressure_threshold: 0.010,
        flow_threshold: 0.1,
        calibration_samples: 50,
    };
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// ADS1115 programmable gain, named by full-scale range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcGain {
    /// ±6.144 V
    TwoThirds,
    /// ±4.096 V
    One,
    /// ±2.048 V
    Two,
    /// ±1.024 V
    Four,
    /// ±0.512 V
    Eight,
    /// ±0.256 V
    Sixteen,
}

impl AdcGain {
    pub const fn full_scale_volts(self) -> f32 {
        match self {
            Self::TwoThirds => 6.144,
            Self::One => 4.096,
            Self::Two => 2.048,
            Self::Four => 1.024,
            Self::Eight => 0.512,
            Self::Sixteen => 0.256,
        }
    }
}

/// External ADC channel used by the ECG/EMG I2C drivers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcChannelConfig {
    pub address: u8,
    pub channel: u8,
    pub gain: AdcGain,
}

impl AdcChannelConfig {
    pub const DEFAULT: Self = Self {
        address: 0x48,
        channel: 0,
        gain: AdcGain::Four,
    };
}

impl Default for AdcChannelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// On-chip analog input used by the direct ECG/EMG drivers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AnalogConfig {
    pub sample_rate_hz: u32,
    pub full_scale_volts: f32,
    pub resolution_bits: u8,
}

impl AnalogConfig {
    pub const DEFAULT: Self = Self {
        sample_rate_hz: 500,
        full_scale_volts: 3.3,
        resolution_bits: 12,
    };
}

impl Default for AnalogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
