//! On-chip analog input driver, rate limited by its own scheduler.

use embedded_hal::digital::InputPin;
use log::{debug, info};

use super::{DriverState, LeadDetect, LeadIds, NoPin, Sensor, SensorError};
use crate::config::AnalogConfig;
use crate::hal::{AnalogInput, Clock};
use crate::protocol::{MessageFramer, SensorId};
use crate::sampling::SampleScheduler;

/// What the driver emits for a conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalogConversion {
    /// The converter code as read.
    Raw,
    /// Volts against a fixed full-scale reference and bit depth.
    Volts {
        full_scale_volts: f32,
        resolution_bits: u8,
    },
}

impl AnalogConversion {
    pub fn from_config(config: &AnalogConfig) -> Self {
        Self::Volts {
            full_scale_volts: config.full_scale_volts,
            resolution_bits: config.resolution_bits,
        }
    }

    pub fn apply(self, code: u16) -> f32 {
        match self {
            Self::Raw => f32::from(code),
            Self::Volts {
                full_scale_volts,
                resolution_bits,
            } => {
                let max_code = (1u32 << resolution_bits.min(16)) - 1;
                f32::from(code) * full_scale_volts / max_code as f32
            }
        }
    }
}

pub struct DirectAnalogSensor<I, P = NoPin> {
    name: &'static str,
    input: I,
    scheduler: SampleScheduler,
    conversion: AnalogConversion,
    id: SensorId,
    leads: Option<LeadDetect<P>>,
    state: DriverState,
}

impl<I: AnalogInput> DirectAnalogSensor<I> {
    pub const fn new(
        name: &'static str,
        input: I,
        config: AnalogConfig,
        id: SensorId,
        conversion: AnalogConversion,
    ) -> Self {
        Self {
            name,
            input,
            scheduler: SampleScheduler::new(config.sample_rate_hz),
            conversion,
            id,
            leads: None,
            state: DriverState::Uninitialized,
        }
    }

    /// ECG front end on an analog pin: raw codes on `EcgCh1`.
    pub const fn ecg(input: I, config: AnalogConfig) -> Self {
        Self::new("ECG (analog)", input, config, SensorId::EcgCh1, AnalogConversion::Raw)
    }

    /// EMG front end on an analog pin: raw codes on `EmgCh1`.
    pub const fn emg(input: I, config: AnalogConfig) -> Self {
        Self::new("EMG (analog)", input, config, SensorId::EmgCh1, AnalogConversion::Raw)
    }

    /// Attach electrode contact lines, sampled at the same rate as the
    /// analog input and emitted ahead of it.
    pub fn with_lead_detect<P: InputPin>(
        self,
        plus: P,
        minus: P,
        ids: LeadIds,
    ) -> DirectAnalogSensor<I, P> {
        DirectAnalogSensor {
            name: self.name,
            input: self.input,
            scheduler: self.scheduler,
            conversion: self.conversion,
            id: self.id,
            leads: Some(LeadDetect::new(plus, minus, ids)),
            state: self.state,
        }
    }
}

impl<I, P> DirectAnalogSensor<I, P> {
    pub fn with_conversion(mut self, conversion: AnalogConversion) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn input(&self) -> &I {
        &self.input
    }
}

impl<I: AnalogInput, P: InputPin> Sensor for DirectAnalogSensor<I, P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> DriverState {
        self.state
    }

    async fn init<C: Clock>(&mut self, clock: &C) -> Result<(), SensorError> {
        self.scheduler.start(clock.now_micros());
        self.state = DriverState::Ready;
        info!(
            "{}: sampling every {} us, {:?}",
            self.name,
            self.scheduler.interval_us(),
            self.conversion
        );
        Ok(())
    }

    async fn read_into<C: Clock>(
        &mut self,
        frame: &mut MessageFramer,
        clock: &C,
    ) -> Result<(), SensorError> {
        if self.state != DriverState::Ready || !self.scheduler.ready(clock.now_micros()) {
            return Ok(());
        }

        if let Some(leads) = self.leads.as_mut() {
            leads.emit(self.name, frame)?;
        }

        let code = self.input.read_raw().map_err(|e| {
            debug!("{}: analog read failed: {:?}", self.name, e);
            SensorError::ReadFailed {
                sensor: self.name,
                operation: "analog read",
                details: "ADC read failed",
            }
        })?;

        frame.add_sample(self.id, self.conversion.apply(code));
        Ok(())
    }
}
