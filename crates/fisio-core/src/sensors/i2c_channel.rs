//! One channel of an external I2C ADC, used for ECG and EMG front ends.

use embedded_hal::digital::InputPin;
use log::{debug, error, info};

use super::{DriverState, LeadDetect, LeadIds, NoPin, Sensor, SensorError};
use crate::config::AdcChannelConfig;
use crate::hal::{Clock, ExternalAdc};
use crate::protocol::{MessageFramer, SensorId};

/// What the driver emits for a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcConversion {
    /// The signed converter code, scaled by the receiver.
    Raw,
    /// Volts, as computed by the converter for its configured range.
    Volts,
}

pub struct I2cChannelSensor<A, P = NoPin> {
    name: &'static str,
    adc: A,
    config: AdcChannelConfig,
    conversion: AdcConversion,
    id: SensorId,
    leads: Option<LeadDetect<P>>,
    state: DriverState,
}

impl<A: ExternalAdc> I2cChannelSensor<A> {
    pub const fn new(
        name: &'static str,
        adc: A,
        config: AdcChannelConfig,
        id: SensorId,
        conversion: AdcConversion,
    ) -> Self {
        Self {
            name,
            adc,
            config,
            conversion,
            id,
            leads: None,
            state: DriverState::Uninitialized,
        }
    }

    /// ECG front end: volts on `EcgCh1`.
    pub const fn ecg(adc: A, config: AdcChannelConfig) -> Self {
        Self::new("ECG (ADS1115)", adc, config, SensorId::EcgCh1, AdcConversion::Volts)
    }

    /// EMG front end: volts on `EmgCh1`.
    pub const fn emg(adc: A, config: AdcChannelConfig) -> Self {
        Self::new("EMG (ADS1115)", adc, config, SensorId::EmgCh1, AdcConversion::Volts)
    }

    /// Attach electrode contact lines. Their states are emitted ahead of the
    /// analog sample.
    pub fn with_lead_detect<P: InputPin>(
        self,
        plus: P,
        minus: P,
        ids: LeadIds,
    ) -> I2cChannelSensor<A, P> {
        I2cChannelSensor {
            name: self.name,
            adc: self.adc,
            config: self.config,
            conversion: self.conversion,
            id: self.id,
            leads: Some(LeadDetect::new(plus, minus, ids)),
            state: self.state,
        }
    }
}

impl<A: ExternalAdc, P> I2cChannelSensor<A, P> {
    pub fn with_conversion(mut self, conversion: AdcConversion) -> Self {
        self.conversion = conversion;
        self
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }
}

impl<A: ExternalAdc, P: InputPin> Sensor for I2cChannelSensor<A, P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> DriverState {
        self.state
    }

    async fn init<C: Clock>(&mut self, _clock: &C) -> Result<(), SensorError> {
        self.state = DriverState::Initializing;
        let result = self.adc.begin(self.config.address);
        self.state = DriverState::Ready;

        match result {
            Ok(()) => {
                info!(
                    "{}: ADC at {:#04x}, channel {}, {:?}",
                    self.name, self.config.address, self.config.channel, self.config.gain
                );
                Ok(())
            }
            Err(e) => {
                error!("{}: ADC at {:#04x} not found: {:?}", self.name, self.config.address, e);
                Err(SensorError::InitializationFailed {
                    sensor: self.name,
                    details: "ADC did not respond",
                })
            }
        }
    }

    async fn read_into<C: Clock>(
        &mut self,
        frame: &mut MessageFramer,
        _clock: &C,
    ) -> Result<(), SensorError> {
        if self.state != DriverState::Ready {
            return Ok(());
        }

        if let Some(leads) = self.leads.as_mut() {
            leads.emit(self.name, frame)?;
        }

        let code = self
            .adc
            .read_single_ended(self.config.channel)
            .map_err(|e| {
                debug!("{}: conversion failed: {:?}", self.name, e);
                SensorError::ReadFailed {
                    sensor: self.name,
                    operation: "conversion",
                    details: "ADC read failed",
                }
            })?;

        let value = match self.conversion {
            AdcConversion::Raw => f32::from(code),
            AdcConversion::Volts => self.adc.compute_volts(code),
        };
        frame.add_sample(self.id, value);
        Ok(())
    }
}
