//! Peripheral setup for the acquisition board
//!
//! Pin map (ESP32-S3):
//! - HX710B channel 1: SCK GPIO6, DOUT GPIO5
//! - HX710B channel 2: SCK GPIO4, DOUT GPIO7
//! - I2C0 (ADS1115): SDA GPIO12, SCL GPIO11
//! - Lead detect: LO+ GPIO2, LO- GPIO3
//! - ADC1 inputs: ECG GPIO1, EMG GPIO9
//! - UART0 frame stream: TX GPIO43, RX GPIO44

use core::cell::RefCell;

use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, Output};
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_hal::{Async, Blocking};
use fisio_core::bus::Hx710b;
use fisio_core::config::BusConfig;
use log::info;
use static_cell::StaticCell;

use super::AppError;
use crate::analog::SharedAdc1;

pub type PressureBus = Hx710b<Output<'static>, Input<'static>, Delay>;

pub type SharedI2c = RefCell<I2c<'static, Blocking>>;

/// Create the UART that carries the binary frame stream.
pub fn create_uart(
    uart0: esp_hal::peripherals::UART0<'static>,
    tx: esp_hal::peripherals::GPIO43<'static>,
    rx: esp_hal::peripherals::GPIO44<'static>,
    baud: u32,
) -> Result<Uart<'static, Async>, AppError> {
    let uart = Uart::new(uart0, UartConfig::default().with_baudrate(baud))
        .map_err(AppError::Uart)?
        .with_tx(tx)
        .with_rx(rx)
        .into_async();
    info!("Frame stream on UART0 at {} baud", baud);
    Ok(uart)
}

/// Create the I2C bus for the external ADCs.
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> Result<I2c<'static, Blocking>, AppError> {
    let i2c = I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .map_err(AppError::I2c)?
    .with_sda(sda)
    .with_scl(scl);
    Ok(i2c)
}

/// Park the I2C bus in static storage so several ADC drivers can borrow it.
///
/// Must be called at most once.
pub fn share_i2c(i2c: I2c<'static, Blocking>) -> &'static SharedI2c {
    static I2C0_BUS: StaticCell<SharedI2c> = StaticCell::new();
    I2C0_BUS.init(RefCell::new(i2c))
}

/// Park ADC1 in static storage so each analog channel can borrow it.
///
/// Must be called at most once.
pub fn share_adc1(
    adc: esp_hal::analog::adc::Adc<'static, esp_hal::peripherals::ADC1<'static>, Blocking>,
) -> &'static SharedAdc1 {
    static ADC1: StaticCell<SharedAdc1> = StaticCell::new();
    ADC1.init(RefCell::new(adc))
}

/// One HX710B channel with the default bus timing.
pub fn pressure_bus(sck: Output<'static>, dout: Input<'static>, delay: Delay) -> PressureBus {
    Hx710b::new(sck, dout, delay, BusConfig::DEFAULT)
}
