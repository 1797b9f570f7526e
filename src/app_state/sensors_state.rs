//! Sensor management and state

#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-emg-ads1115"))]
use embedded_hal_bus::i2c::RefCellDevice;
#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
use esp_hal::gpio::Input;
#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-emg-ads1115"))]
use fisio_core::ads1115::Ads1115;
#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-emg-ads1115"))]
use fisio_core::sensors::I2cChannelSensor;
#[cfg(any(feature = "sensor-ecg-analog", feature = "sensor-emg-analog"))]
use fisio_core::sensors::DirectAnalogSensor;
#[cfg(feature = "sensor-dual-pressure")]
use fisio_core::sensors::DualPressureSensor;
#[cfg(any(feature = "sensor-ecg-analog", feature = "sensor-emg-analog"))]
use crate::analog::AnalogChannel;

use fisio_core::hal::Clock;
use fisio_core::protocol::MessageFramer;
#[allow(unused_imports)]
use fisio_core::sensors::{Sensor, SensorGroup, init_logged, read_logged};
use log::info;

#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-emg-ads1115"))]
pub type BoardAds1115 = Ads1115<
    RefCellDevice<'static, esp_hal::i2c::master::I2c<'static, esp_hal::Blocking>>,
    esp_hal::delay::Delay,
>;

#[cfg(feature = "sensor-dual-pressure")]
pub type PressureSensor = DualPressureSensor<
    esp_hal::gpio::Output<'static>,
    esp_hal::gpio::Input<'static>,
    esp_hal::delay::Delay,
>;

#[cfg(feature = "sensor-ecg-ads1115")]
pub type EcgSensor = I2cChannelSensor<BoardAds1115, Input<'static>>;

#[cfg(feature = "sensor-ecg-analog")]
pub type EcgSensor =
    DirectAnalogSensor<AnalogChannel<esp_hal::peripherals::GPIO1<'static>>, Input<'static>>;

#[cfg(feature = "sensor-emg-ads1115")]
pub type EmgSensor = I2cChannelSensor<BoardAds1115>;

#[cfg(feature = "sensor-emg-analog")]
pub type EmgSensor = DirectAnalogSensor<AnalogChannel<esp_hal::peripherals::GPIO9<'static>>>;

/// Container for all sensor instances
///
/// Which fields exist is decided by the `sensor-*` cargo features. Sensors
/// are always initialised and read in declaration order, so the pressure
/// samples lead every frame.
pub struct SensorsState {
    #[cfg(feature = "sensor-dual-pressure")]
    pub pressure: PressureSensor,
    #[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
    pub ecg: EcgSensor,
    #[cfg(any(feature = "sensor-emg-ads1115", feature = "sensor-emg-analog"))]
    pub emg: EmgSensor,
}

impl SensorsState {
    /// Log the active sensor set.
    pub fn log_active(&self) {
        info!("Active sensors:");
        #[cfg(feature = "sensor-dual-pressure")]
        info!("  - {}", self.pressure.name());
        #[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
        info!("  - {}", self.ecg.name());
        #[cfg(any(feature = "sensor-emg-ads1115", feature = "sensor-emg-analog"))]
        info!("  - {}", self.emg.name());
    }
}

#[allow(unused_variables)]
impl SensorGroup for SensorsState {
    async fn init_all<C: Clock>(&mut self, clock: &C) {
        #[cfg(feature = "sensor-dual-pressure")]
        init_logged(&mut self.pressure, clock).await;

        #[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
        init_logged(&mut self.ecg, clock).await;

        #[cfg(any(feature = "sensor-emg-ads1115", feature = "sensor-emg-analog"))]
        init_logged(&mut self.emg, clock).await;
    }

    async fn read_all<C: Clock>(&mut self, frame: &mut MessageFramer, clock: &C) {
        #[cfg(feature = "sensor-dual-pressure")]
        read_logged(&mut self.pressure, frame, clock).await;

        #[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
        read_logged(&mut self.ecg, frame, clock).await;

        #[cfg(any(feature = "sensor-emg-ads1115", feature = "sensor-emg-analog"))]
        read_logged(&mut self.emg, frame, clock).await;
    }
}
