//! ESP32-S3 specific parts of the fisio-rs firmware
//!
//! Everything here binds `fisio-core` to real peripherals: the embassy time
//! base, the UART frame sink, the on-chip ADC and the board wiring of the
//! sensors selected through cargo features.

#![no_std]

#[cfg(all(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
compile_error!("enable at most one of `sensor-ecg-ads1115` and `sensor-ecg-analog`");

#[cfg(all(feature = "sensor-emg-ads1115", feature = "sensor-emg-analog"))]
compile_error!("enable at most one of `sensor-emg-ads1115` and `sensor-emg-analog`");

pub mod analog;
pub mod app_state;
pub mod clock;
pub mod serial;
