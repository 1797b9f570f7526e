//! Bakes the unit's identity and link settings into the firmware.
//!
//! Values come from the environment, optionally loaded from a `.env` file at
//! the crate root:
//!
//! - `FISIO_DEVICE_ID`: 16-bit unit identifier, decimal or `0x` hex (default `0x0001`)
//! - `FISIO_SERIAL_BAUD`: UART baud rate (default `115200`)

use std::env;

const DEFAULT_DEVICE_ID: u16 = 0x0001;
const DEFAULT_SERIAL_BAUD: u32 = 115_200;

fn parse_u16(value: &str) -> Option<u16> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn main() {
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-env-changed=FISIO_DEVICE_ID");
    println!("cargo:rerun-if-env-changed=FISIO_SERIAL_BAUD");

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            println!("cargo:warning=Ignoring unreadable .env: {e}");
        }
    }

    let device_id = match env::var("FISIO_DEVICE_ID") {
        Ok(raw) => parse_u16(&raw).unwrap_or_else(|| {
            panic!("FISIO_DEVICE_ID must be a 16-bit integer, got {raw:?}")
        }),
        Err(_) => DEFAULT_DEVICE_ID,
    };

    let serial_baud = match env::var("FISIO_SERIAL_BAUD") {
        Ok(raw) => raw
            .trim()
            .parse::<u32>()
            .unwrap_or_else(|_| panic!("FISIO_SERIAL_BAUD must be an integer, got {raw:?}")),
        Err(_) => DEFAULT_SERIAL_BAUD,
    };

    println!("cargo:rustc-env=FISIO_DEVICE_ID={device_id}");
    println!("cargo:rustc-env=FISIO_SERIAL_BAUD={serial_baud}");
}
