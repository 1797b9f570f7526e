//! Bit-banged buses for converters without dedicated bus hardware.

mod hx710b;

pub use hx710b::{BusError, Hx710b, sign_extend_24};
