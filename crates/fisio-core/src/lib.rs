//! Hardware-independent core library for fisio-rs
//!
//! This crate contains all platform-agnostic logic of the acquisition
//! firmware: the HX710B bit-banged bus, per-sensor sample scheduling,
//! pressure calibration and flow/volume derivation, the sensor drivers,
//! the ADS1115 register driver, the acquisition loop and the binary frame
//! protocol (framer, CRC16 and decoder).
//!
//! It is `#![no_std]` so it compiles on both the ESP32-S3 target and desktop
//! hosts (for the simulator and tests). Hardware is reached only through the
//! traits in [`hal`] and the `embedded-hal` digital/delay traits.

#![cfg_attr(not(test), no_std)]

pub mod ads1115;
pub mod bus;
pub mod calibration;
pub mod config;
pub mod dispatcher;
pub mod hal;
pub mod protocol;
pub mod sampling;
pub mod sensors;

#[cfg(test)]
pub(crate) mod testing;
