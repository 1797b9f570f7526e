//! Acquisition loop: read every sensor, frame the cycle, hand it off.

use log::{debug, info, warn};

use crate::hal::{Clock, Transport};
use crate::protocol::{DeviceIdentity, MessageFramer};
use crate::sensors::SensorGroup;

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub cycles: u32,
    pub frames_sent: u32,
    pub transport_failures: u32,
    pub samples_dropped: u32,
}

/// Owns the frame buffer, the outbound transport and the clock shared by
/// all sensors.
pub struct Acquisition<T, C> {
    framer: MessageFramer,
    transport: T,
    clock: C,
    stats: AcquisitionStats,
}

impl<T: Transport, C: Clock> Acquisition<T, C> {
    pub const fn new(identity: DeviceIdentity, transport: T, clock: C) -> Self {
        Self {
            framer: MessageFramer::new(identity),
            transport,
            clock,
            stats: AcquisitionStats {
                cycles: 0,
                frames_sent: 0,
                transport_failures: 0,
                samples_dropped: 0,
            },
        }
    }

    pub const fn stats(&self) -> &AcquisitionStats {
        &self.stats
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Initialise every sensor in order. Failures leave the sensor degraded
    /// and never abort startup.
    pub async fn start<S: SensorGroup>(&mut self, sensors: &mut S) {
        info!("Initializing sensors for device {:#06x}", self.framer.identity().get());
        sensors.init_all(&self.clock).await;
        info!("Sensors initialized");
    }

    /// One cycle: collect samples from every sensor and send them as a
    /// single frame stamped with the flush time.
    ///
    /// Returns the frame length, or `None` when nothing was sent.
    pub async fn run_cycle<S: SensorGroup>(&mut self, sensors: &mut S) -> Option<usize> {
        sensors.read_all(&mut self.framer, &self.clock).await;

        self.stats.cycles = self.stats.cycles.wrapping_add(1);
        self.stats.samples_dropped = self
            .stats
            .samples_dropped
            .wrapping_add(self.framer.dropped() as u32);

        let timestamp_ms = self.clock.now_millis();
        match self.framer.flush(timestamp_ms, &mut self.transport).await {
            Ok(Some(len)) => {
                self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
                debug!(
                    "Frame {} sent at {} ms: {} bytes",
                    self.stats.frames_sent, timestamp_ms, len
                );
                Some(len)
            }
            Ok(None) => None,
            Err(e) => {
                self.stats.transport_failures = self.stats.transport_failures.wrapping_add(1);
                warn!("Frame dropped, transport failed: {:?}", e);
                None
            }
        }
    }
}
