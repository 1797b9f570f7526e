//! Binary frame protocol shared with the receiving host.
//!
//! Frame layout (little-endian throughout):
//!
//! | Offset      | Size | Field                                  |
//! |-------------|------|----------------------------------------|
//! | 0           | 1    | sync byte 1 (`0xFF`)                   |
//! | 1           | 1    | sync byte 2 (`0xAA`)                   |
//! | 2           | 2    | device identity (`u16`)                |
//! | 4           | 4    | timestamp, device milliseconds (`u32`) |
//! | 8           | 1    | sample count `N` (0..=32)              |
//! | 9           | 5·N  | `N` × (`u8` sensor id, `f32` value)    |
//! | 9 + 5·N     | 2    | CRC16 over bytes `[2 .. 9 + 5·N)`      |

mod crc;
mod decoder;
mod framer;
mod ids;

pub use crc::crc16;
pub use decoder::{DecodedFrame, FrameDecoder, FrameError, parse_frame};
pub use framer::MessageFramer;
pub use ids::SensorId;

pub const SYNC_BYTE_1: u8 = 0xFF;
pub const SYNC_BYTE_2: u8 = 0xAA;

/// Maximum number of samples carried by a single frame.
pub const MAX_SAMPLES_PER_FRAME: usize = 32;

/// Sync + identity + timestamp + count.
pub const HEADER_LEN: usize = 9;
/// Sensor id + `f32` value.
pub const SAMPLE_LEN: usize = 5;
pub const CRC_LEN: usize = 2;

/// Size in bytes of the largest possible frame.
pub const MAX_FRAME_LEN: usize = frame_len(MAX_SAMPLES_PER_FRAME);

/// Total frame size for `samples` entries.
pub const fn frame_len(samples: usize) -> usize {
    HEADER_LEN + samples * SAMPLE_LEN + CRC_LEN
}

/// 16-bit per-unit identifier embedded in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity(pub u16);

impl DeviceIdentity {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

/// One typed measurement as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub sensor_id: u8,
    pub value: f32,
}

impl Sample {
    pub const fn new(sensor_id: SensorId, value: f32) -> Self {
        Self {
            sensor_id: sensor_id as u8,
            value,
        }
    }

    /// Known sensor id, if the raw byte belongs to the table.
    pub fn id(&self) -> Option<SensorId> {
        SensorId::try_from(self.sensor_id).ok()
    }
}
