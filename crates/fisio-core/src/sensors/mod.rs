//! Sensor driver abstraction
//!
//! Every physical sensing element is owned by one driver implementing
//! [`Sensor`]. Drivers push their typed samples straight into the frame
//! being assembled for the current cycle. Which drivers exist on a unit is
//! decided at build time; the firmware groups them behind [`SensorGroup`].

mod direct_analog;
mod dual_pressure;
mod i2c_channel;

pub use direct_analog::{AnalogConversion, DirectAnalogSensor};
pub use dual_pressure::{DualPressureSensor, PressureChannelIds};
pub use i2c_channel::{AdcConversion, I2cChannelSensor};

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};
use log::{error, warn};
use thiserror_no_std::Error;

use crate::hal::Clock;
use crate::protocol::{MessageFramer, SensorId};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor} initialization failed: {details}")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor} {operation} failed: {details}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} timed out during {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// Lifecycle of a driver. Only a `Ready` driver emits samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initializing,
    Calibrating,
    Ready,
}

/// A driver owning one physical sensing element.
pub trait Sensor {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn state(&self) -> DriverState;

    /// Bring the hardware up and run any calibration.
    ///
    /// The driver ends up `Ready` even when this returns an error; it then
    /// runs degraded and emits only what its hardware still delivers.
    fn init<C: Clock>(&mut self, clock: &C) -> impl Future<Output = Result<(), SensorError>>;

    /// Take this cycle's readings and append them to `frame`.
    ///
    /// Emits nothing outside the `Ready` state or when the sensor's own rate
    /// gate is closed.
    fn read_into<C: Clock>(
        &mut self,
        frame: &mut MessageFramer,
        clock: &C,
    ) -> impl Future<Output = Result<(), SensorError>>;
}

/// The fixed, ordered set of drivers active on a unit.
///
/// Errors are logged here and never stop the acquisition loop.
pub trait SensorGroup {
    fn init_all<C: Clock>(&mut self, clock: &C) -> impl Future<Output = ()>;

    fn read_all<C: Clock>(&mut self, frame: &mut MessageFramer, clock: &C)
    -> impl Future<Output = ()>;
}

/// Initialise one driver, logging a failure instead of propagating it.
pub async fn init_logged<S: Sensor, C: Clock>(sensor: &mut S, clock: &C) {
    if let Err(e) = sensor.init(clock).await {
        error!("{} running degraded: {}", sensor.name(), e);
    }
}

/// Read one driver, logging a failure instead of propagating it.
pub async fn read_logged<S: Sensor, C: Clock>(
    sensor: &mut S,
    frame: &mut MessageFramer,
    clock: &C,
) {
    if let Err(e) = sensor.read_into(frame, clock).await {
        warn!("{}", e);
    }
}

macro_rules! impl_sensor_group {
    ($($sensor:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($sensor: Sensor),+> SensorGroup for ($($sensor,)+) {
            async fn init_all<C: Clock>(&mut self, clock: &C) {
                let ($($sensor,)+) = self;
                $(init_logged($sensor, clock).await;)+
            }

            async fn read_all<C: Clock>(&mut self, frame: &mut MessageFramer, clock: &C) {
                let ($($sensor,)+) = self;
                $(read_logged($sensor, frame, clock).await;)+
            }
        }
    };
}

impl_sensor_group!(A);
impl_sensor_group!(A, B);
impl_sensor_group!(A, B, C1);
impl_sensor_group!(A, B, C1, D);
impl_sensor_group!(A, B, C1, D, E);

/// Placeholder for an unconnected lead-detect line.
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl InputPin for NoPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Sample ids carrying the two electrode contact states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadIds {
    pub plus: SensorId,
    pub minus: SensorId,
}

impl LeadIds {
    /// The ECG lead-off slots. The id table has no EMG counterpart, so an EMG
    /// front end with contact sensing reports here too or on generic ids.
    pub const ECG: Self = Self {
        plus: SensorId::EcgLeadPlus,
        minus: SensorId::EcgLeadMinus,
    };
}

/// Electrode contact lines of a bio-potential front end (AD8232 style).
///
/// A line reads LOW while its electrode is attached.
pub struct LeadDetect<P> {
    plus: P,
    minus: P,
    ids: LeadIds,
}

impl<P: InputPin> LeadDetect<P> {
    pub const fn new(plus: P, minus: P, ids: LeadIds) -> Self {
        Self { plus, minus, ids }
    }

    /// Emit both contact states as 1.0 (attached) / 0.0 (detached).
    /// Returns whether both electrodes are attached.
    pub fn emit(&mut self, sensor: &'static str, frame: &mut MessageFramer) -> Result<bool, SensorError> {
        let plus = Self::attached(&mut self.plus, sensor)?;
        let minus = Self::attached(&mut self.minus, sensor)?;

        frame.add_sample(self.ids.plus, if plus { 1.0 } else { 0.0 });
        frame.add_sample(self.ids.minus, if minus { 1.0 } else { 0.0 });

        Ok(plus && minus)
    }

    fn attached(pin: &mut P, sensor: &'static str) -> Result<bool, SensorError> {
        pin.is_low().map_err(|_| SensorError::ReadFailed {
            sensor,
            operation: "lead detection",
            details: "lead-detect pin unreadable",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DeviceIdentity;
    use crate::testing::FixedInput;

    #[test]
    fn test_lead_detect_uses_configured_ids() {
        let ids = LeadIds {
            plus: SensorId::AdcCh2,
            minus: SensorId::AdcCh3,
        };
        let mut leads = LeadDetect::new(FixedInput::low(), FixedInput::high(), ids);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));

        assert_eq!(leads.emit("emg", &mut frame), Ok(false));

        let samples = frame.samples();
        assert_eq!(samples[0].id(), Some(SensorId::AdcCh2));
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[1].id(), Some(SensorId::AdcCh3));
        assert_eq!(samples[1].value, 0.0);
    }

    #[test]
    fn test_ecg_lead_ids() {
        let mut leads = LeadDetect::new(FixedInput::low(), FixedInput::low(), LeadIds::ECG);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));

        assert_eq!(leads.emit("ecg", &mut frame), Ok(true));
        let ids: std::vec::Vec<_> = frame.samples().iter().filter_map(|s| s.id()).collect();
        assert_eq!(ids, [SensorId::EcgLeadPlus, SensorId::EcgLeadMinus]);
    }
}
