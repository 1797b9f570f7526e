use heapless::Vec;
use log::debug;

use super::{
    CRC_LEN, DeviceIdentity, HEADER_LEN, MAX_FRAME_LEN, MAX_SAMPLES_PER_FRAME, SAMPLE_LEN,
    SYNC_BYTE_1, SYNC_BYTE_2, Sample, SensorId, crc16,
};
use crate::hal::Transport;

/// Accumulates the samples of one acquisition cycle and turns them into a
/// wire frame.
///
/// The buffer holds at most [`MAX_SAMPLES_PER_FRAME`] samples. Anything
/// pushed past that is dropped without error; the count of dropped samples
/// is kept only for diagnostics and resets with every flush.
pub struct MessageFramer {
    identity: DeviceIdentity,
    samples: Vec<Sample, MAX_SAMPLES_PER_FRAME>,
    dropped: usize,
}

impl MessageFramer {
    pub const fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            samples: Vec::new(),
            dropped: 0,
        }
    }

    pub const fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    /// Queue a sample for the next frame.
    pub fn add_sample(&mut self, id: SensorId, value: f32) {
        self.push(Sample::new(id, value));
    }

    /// Queue an already built sample for the next frame.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.push(sample).is_err() {
            self.dropped += 1;
        }
    }

    /// Samples queued for the next frame, in insertion order.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples rejected since the last flush because the buffer was full.
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Discard everything queued so far.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }

    /// Serialize the queued samples into `out` and return the frame length.
    pub fn encode(&self, timestamp_ms: u32, out: &mut [u8; MAX_FRAME_LEN]) -> usize {
        out[0] = SYNC_BYTE_1;
        out[1] = SYNC_BYTE_2;
        out[2..4].copy_from_slice(&self.identity.get().to_le_bytes());
        out[4..8].copy_from_slice(&timestamp_ms.to_le_bytes());
        out[8] = self.samples.len() as u8;

        let mut offset = HEADER_LEN;
        for sample in self.samples.iter() {
            out[offset] = sample.sensor_id;
            out[offset + 1..offset + SAMPLE_LEN].copy_from_slice(&sample.value.to_le_bytes());
            offset += SAMPLE_LEN;
        }

        let crc = crc16(&out[2..offset]);
        out[offset..offset + CRC_LEN].copy_from_slice(&crc.to_le_bytes());
        offset + CRC_LEN
    }

    /// Frame the queued samples and hand them to `transport`.
    ///
    /// Returns `Ok(None)` without touching the transport when nothing is
    /// queued, otherwise the number of bytes written. The buffer is cleared
    /// whether or not the transport accepted the frame; frames are never
    /// retried.
    pub async fn flush<T: Transport>(
        &mut self,
        timestamp_ms: u32,
        transport: &mut T,
    ) -> Result<Option<usize>, T::Error> {
        if self.samples.is_empty() {
            return Ok(None);
        }

        let mut frame = [0u8; MAX_FRAME_LEN];
        let len = self.encode(timestamp_ms, &mut frame);

        if self.dropped > 0 {
            debug!("Frame full: {} samples dropped this cycle", self.dropped);
        }
        self.reset();

        transport.send(&frame[..len]).await.map(|()| Some(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_frame;
    use crate::testing::RecordingTransport;
    use embassy_futures::block_on;

    #[test]
    fn test_end_to_end_frame_bytes() {
        let mut framer = MessageFramer::new(DeviceIdentity::new(0x0001));
        let mut transport = RecordingTransport::default();
        framer.add_sample(SensorId::Pressure1, 1.5);

        let written = block_on(framer.flush(1000, &mut transport)).unwrap();

        assert_eq!(written, Some(16));
        assert_eq!(
            transport.frames[0],
            [
                0xFF, 0xAA, 0x01, 0x00, 0xE8, 0x03, 0x00, 0x00, 0x01, 0x33, 0x00, 0x00, 0xC0,
                0x3F, 0x8A, 0x34
            ]
        );
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let mut framer = MessageFramer::new(DeviceIdentity::new(7));
        let mut transport = RecordingTransport::default();

        assert_eq!(block_on(framer.flush(1, &mut transport)).unwrap(), None);
        assert_eq!(block_on(framer.flush(2, &mut transport)).unwrap(), None);
        assert!(transport.frames.is_empty());
    }

    #[test]
    fn test_flush_preserves_insertion_order() {
        let mut framer = MessageFramer::new(DeviceIdentity::new(0x1234));
        let mut transport = RecordingTransport::default();
        let values = [
            (SensorId::Volume2, -0.25_f32),
            (SensorId::EcgCh1, 1.0e-7),
            (SensorId::Pressure1, f32::MAX),
            (SensorId::EcgLeadPlus, 1.0),
        ];
        for (id, value) in values {
            framer.add_sample(id, value);
        }

        block_on(framer.flush(0xDEAD_BEEF, &mut transport)).unwrap();

        let frame = parse_frame(&transport.frames[0]).unwrap();
        assert_eq!(transport.frames[0][8], values.len() as u8);
        assert_eq!(frame.identity, DeviceIdentity::new(0x1234));
        assert_eq!(frame.timestamp_ms, 0xDEAD_BEEF);
        for (decoded, (id, value)) in frame.samples.iter().zip(values) {
            assert_eq!(decoded.sensor_id, id as u8);
            assert_eq!(decoded.value.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_capacity_drops_extra_samples() {
        let mut framer = MessageFramer::new(DeviceIdentity::new(1));
        let mut transport = RecordingTransport::default();
        for i in 0..40 {
            framer.add_sample(SensorId::AdcCh0, i as f32);
        }

        assert_eq!(framer.len(), MAX_SAMPLES_PER_FRAME);
        assert_eq!(framer.dropped(), 8);

        let written = block_on(framer.flush(5, &mut transport)).unwrap();
        assert_eq!(written, Some(MAX_FRAME_LEN));
        let frame = parse_frame(&transport.frames[0]).unwrap();
        assert_eq!(frame.samples.len(), MAX_SAMPLES_PER_FRAME);
        assert_eq!(frame.samples[31].value, 31.0);
        assert_eq!(framer.dropped(), 0);
    }

    #[test]
    fn test_buffer_cleared_when_transport_fails() {
        let mut framer = MessageFramer::new(DeviceIdentity::new(1));
        let mut transport = RecordingTransport::failing();
        framer.add_sample(SensorId::EmgCh1, 2048.0);

        assert!(block_on(framer.flush(10, &mut transport)).is_err());
        assert!(framer.is_empty());
        assert_eq!(block_on(framer.flush(11, &mut transport)).unwrap(), None);
    }
}
