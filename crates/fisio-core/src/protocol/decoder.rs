//! Receiver-side frame decoding.
//!
//! The firmware itself never decodes frames; this lives here so the
//! simulator and the tests can check what actually goes out on the wire with
//! the same resynchronisation rules the host application applies.

use heapless::Vec;
use thiserror_no_std::Error;

use super::{
    CRC_LEN, DeviceIdentity, HEADER_LEN, MAX_FRAME_LEN, MAX_SAMPLES_PER_FRAME, SAMPLE_LEN,
    SYNC_BYTE_1, SYNC_BYTE_2, Sample, crc16, frame_len,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame too short: needed {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },
    #[error("Frame does not start with sync bytes")]
    BadSync,
    #[error("Frame announces {0} samples, more than a frame can carry")]
    TooManySamples(u8),
    #[error("CRC mismatch: frame carries {found:04X}, computed {expected:04X}")]
    CrcMismatch { expected: u16, found: u16 },
}

/// A frame whose sync bytes and CRC have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub identity: DeviceIdentity,
    pub timestamp_ms: u32,
    pub samples: Vec<Sample, MAX_SAMPLES_PER_FRAME>,
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

/// Decode one complete frame located at the start of `bytes`.
///
/// Trailing bytes after the CRC are ignored.
pub fn parse_frame(bytes: &[u8]) -> Result<DecodedFrame, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::TooShort {
            needed: HEADER_LEN,
            available: bytes.len(),
        });
    }
    if bytes[0] != SYNC_BYTE_1 || bytes[1] != SYNC_BYTE_2 {
        return Err(FrameError::BadSync);
    }

    let count = bytes[8];
    if count as usize > MAX_SAMPLES_PER_FRAME {
        return Err(FrameError::TooManySamples(count));
    }

    let total = frame_len(count as usize);
    if bytes.len() < total {
        return Err(FrameError::TooShort {
            needed: total,
            available: bytes.len(),
        });
    }

    let payload_end = total - CRC_LEN;
    let found = read_u16(bytes, payload_end);
    let expected = crc16(&bytes[2..payload_end]);
    if found != expected {
        return Err(FrameError::CrcMismatch { expected, found });
    }

    let mut samples = Vec::new();
    for chunk in bytes[HEADER_LEN..payload_end].chunks_exact(SAMPLE_LEN) {
        let value = f32::from_le_bytes([chunk[1], chunk[2], chunk[3], chunk[4]]);
        // Bounded by the count check above.
        let _ = samples.push(Sample {
            sensor_id: chunk[0],
            value,
        });
    }

    Ok(DecodedFrame {
        identity: DeviceIdentity::new(read_u16(bytes, 2)),
        timestamp_ms: read_u32(bytes, 4),
        samples,
    })
}

/// Streaming decoder for a byte stream that may start mid-frame or carry
/// corrupted frames.
///
/// Bytes before a sync pair are discarded. A frame that fails its CRC check
/// is reported once, then the decoder skips its sync pair and searches for the
/// next one.
pub struct FrameDecoder<const N: usize = { 2 * MAX_FRAME_LEN }> {
    buf: Vec<u8, N>,
}

impl<const N: usize> Default for FrameDecoder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameDecoder<N> {
    pub const fn new() -> Self {
        const { assert!(N >= MAX_FRAME_LEN, "decoder buffer must fit one full frame") };
        Self { buf: Vec::new() }
    }

    /// Bytes currently buffered and not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append received bytes. When the buffer is full the oldest data is
    /// given up in favour of the newest.
    pub fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            if self.buf.is_full() {
                self.make_room();
            }
            let _ = self.buf.push(byte);
        }
    }

    /// Pull the next frame out of the buffer.
    ///
    /// Returns `None` once no complete frame is left. Corrupted frames come
    /// back as `Some(Err(..))` so the caller can count or log them.
    pub fn next_frame(&mut self) -> Option<Result<DecodedFrame, FrameError>> {
        let Some(start) = self.find_sync(0) else {
            // Keep a trailing first sync byte; its partner may be in flight.
            let keep = usize::from(self.buf.last() == Some(&SYNC_BYTE_1));
            self.discard(self.buf.len() - keep);
            return None;
        };
        self.discard(start);

        if self.buf.len() < HEADER_LEN {
            return None;
        }

        let count = self.buf[8];
        if count as usize > MAX_SAMPLES_PER_FRAME {
            self.discard(2);
            return Some(Err(FrameError::TooManySamples(count)));
        }

        let total = frame_len(count as usize);
        if self.buf.len() < total {
            return None;
        }

        match parse_frame(&self.buf[..total]) {
            Ok(frame) => {
                self.discard(total);
                Some(Ok(frame))
            }
            Err(e) => {
                self.discard(2);
                Some(Err(e))
            }
        }
    }

    fn find_sync(&self, from: usize) -> Option<usize> {
        self.buf
            .get(from..)?
            .windows(2)
            .position(|pair| *pair == [SYNC_BYTE_1, SYNC_BYTE_2])
            .map(|pos| pos + from)
    }

    fn make_room(&mut self) {
        match self.find_sync(1) {
            Some(next) => self.discard(next),
            None => self.discard(self.buf.len() - 1),
        }
    }

    fn discard(&mut self, count: usize) {
        let len = self.buf.len();
        let count = count.min(len);
        self.buf.copy_within(count..len, 0);
        self.buf.truncate(len - count);
    }
}
