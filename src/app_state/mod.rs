//! Board bring-up and the sensor set for fisio-rs

mod hardware;
mod sensors_state;

pub use hardware::*;
pub use sensors_state::*;

use thiserror_no_std::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("UART configuration rejected: {0:?}")]
    Uart(esp_hal::uart::ConfigError),
    #[error("I2C configuration rejected: {0:?}")]
    I2c(esp_hal::i2c::master::ConfigError),
}
