//! Two-channel differential pressure driver for the spirometer head.
//!
//! Each channel is an HX710B on its own clock/data pair with its own zero
//! offset and volume integrator. Channel 1 is read and emitted before
//! channel 2.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, error, info};

use super::{DriverState, Sensor, SensorError};
use crate::bus::{BusError, Hx710b};
use crate::calibration::{CalibrationEngine, CalibrationState, OffsetAccumulator, decile_progress};
use crate::config::PressureConfig;
use crate::hal::Clock;
use crate::protocol::{MessageFramer, SensorId};

const NAME: &str = "Dual pressure";

/// Sample identifiers emitted for one pressure channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressureChannelIds {
    pub pressure: SensorId,
    pub flow: SensorId,
    pub volume: SensorId,
}

impl PressureChannelIds {
    pub const CHANNEL_1: Self = Self {
        pressure: SensorId::Pressure1,
        flow: SensorId::Flow1,
        volume: SensorId::Volume1,
    };

    pub const CHANNEL_2: Self = Self {
        pressure: SensorId::Pressure2,
        flow: SensorId::Flow2,
        volume: SensorId::Volume2,
    };
}

struct PressureChannel<SCK, DOUT, D> {
    label: &'static str,
    bus: Hx710b<SCK, DOUT, D>,
    engine: CalibrationEngine,
    ids: PressureChannelIds,
    present: bool,
}

pub struct DualPressureSensor<SCK, DOUT, D> {
    channels: [PressureChannel<SCK, DOUT, D>; 2],
    state: DriverState,
}

impl<SCK, DOUT, D> DualPressureSensor<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    pub fn new(
        channel_1: Hx710b<SCK, DOUT, D>,
        channel_2: Hx710b<SCK, DOUT, D>,
        config: PressureConfig,
    ) -> Self {
        Self {
            channels: [
                PressureChannel {
                    label: "channel 1",
                    bus: channel_1,
                    engine: CalibrationEngine::new(config),
                    ids: PressureChannelIds::CHANNEL_1,
                    present: false,
                },
                PressureChannel {
                    label: "channel 2",
                    bus: channel_2,
                    engine: CalibrationEngine::new(config),
                    ids: PressureChannelIds::CHANNEL_2,
                    present: false,
                },
            ],
            state: DriverState::Uninitialized,
        }
    }

    /// Calibration state of channel `index` (0 or 1).
    pub fn calibration(&self, index: usize) -> Option<&CalibrationState> {
        self.channels.get(index).map(|ch| ch.engine.state())
    }

    /// Whether channel `index` answered during init and calibrated.
    pub fn is_present(&self, index: usize) -> bool {
        self.channels.get(index).is_some_and(|ch| ch.present)
    }

    /// Zero both volume integrators, e.g. at the start of a new manoeuvre.
    pub fn reset_volume<C: Clock>(&mut self, clock: &C) {
        let now = clock.now_micros();
        for ch in self.channels.iter_mut() {
            ch.engine.reset_volume(now);
        }
        info!("{}: volume reset", NAME);
    }

    /// Whether channel `index` finished its zero-offset calibration.
    pub fn is_calibrated(&self, index: usize) -> bool {
        self.channels.get(index).is_some_and(|ch| ch.engine.is_calibrated())
    }

    /// Average `calibration_samples` quiescent readings per present channel.
    ///
    /// A channel that misses any of them keeps no offset and is dropped from
    /// the read cycle.
    fn calibrate<C: Clock>(&mut self, clock: &C) -> Result<(), SensorError> {
        let total = self.channels[0].engine.config().calibration_samples;
        info!("{}: calibrating zero offset, keep the airway still", NAME);

        let mut accumulators = [OffsetAccumulator::new(); 2];
        for step in 1..=total {
            for (ch, acc) in self.channels.iter_mut().zip(accumulators.iter_mut()) {
                if !ch.present {
                    continue;
                }
                match ch.bus.read24() {
                    Ok(raw) => acc.push(raw),
                    Err(e) => debug!("{} {}: calibration read failed: {}", NAME, ch.label, e),
                }
            }
            if let Some(percent) = decile_progress(step, total) {
                info!("{}: calibration {}%", NAME, percent);
            }
        }

        let now = clock.now_micros();
        let mut result = Ok(());
        for (ch, acc) in self.channels.iter_mut().zip(accumulators.iter()) {
            if !ch.present {
                continue;
            }
            match acc.mean() {
                Some(offset) if acc.count() == total => {
                    ch.engine.complete(offset, now);
                    info!("{} {}: offset {} from {} readings", NAME, ch.label, offset, total);
                }
                _ => {
                    ch.present = false;
                    error!(
                        "{} {}: calibration got {} of {} readings, channel disabled",
                        NAME,
                        ch.label,
                        acc.count(),
                        total
                    );
                    result = Err(SensorError::InitializationFailed {
                        sensor: NAME,
                        details: "zero-offset calibration incomplete",
                    });
                }
            }
        }
        result
    }
}

impl<SCK, DOUT, D> Sensor for DualPressureSensor<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    fn name(&self) -> &'static str {
        NAME
    }

    fn state(&self) -> DriverState {
        self.state
    }

    async fn init<C: Clock>(&mut self, clock: &C) -> Result<(), SensorError> {
        self.state = DriverState::Initializing;

        let mut result = Ok(());
        for ch in self.channels.iter_mut() {
            match ch.bus.init() {
                Ok(()) => {
                    ch.present = true;
                    info!("{} {}: HX710B ready", NAME, ch.label);
                }
                Err(e) => {
                    ch.present = false;
                    error!("{} {}: {}", NAME, ch.label, e);
                    result = Err(SensorError::InitializationFailed {
                        sensor: NAME,
                        details: "HX710B not responding",
                    });
                }
            }
        }

        self.state = DriverState::Calibrating;
        let calibration = self.calibrate(clock);
        self.state = DriverState::Ready;

        result.and(calibration)
    }

    async fn read_into<C: Clock>(
        &mut self,
        frame: &mut MessageFramer,
        clock: &C,
    ) -> Result<(), SensorError> {
        if self.state != DriverState::Ready {
            return Ok(());
        }

        let mut result = Ok(());
        for ch in self.channels.iter_mut().filter(|ch| ch.present) {
            let raw = match ch.bus.read24() {
                Ok(raw) => raw,
                Err(BusError::Timeout { .. }) => {
                    result = Err(SensorError::Timeout {
                        sensor: NAME,
                        operation: ch.label,
                    });
                    continue;
                }
                Err(_) => {
                    result = Err(SensorError::ReadFailed {
                        sensor: NAME,
                        operation: ch.label,
                        details: "HX710B pin access failed",
                    });
                    continue;
                }
            };

            if let Some(reading) = ch.engine.process(raw, clock.now_micros()) {
                frame.add_sample(ch.ids.pressure, reading.pressure_kpa);
                frame.add_sample(ch.ids.flow, reading.flow);
                frame.add_sample(ch.ids.volume, reading.volume);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::config::BusConfig;
    use crate::protocol::DeviceIdentity;
    use crate::testing::{ManualClock, NoopDelay, SimDout, SimHx710b, SimSck};

    type TestSensor = DualPressureSensor<SimSck, SimDout, NoopDelay>;

    const CONFIG: PressureConfig = PressureConfig {
        counts_to_kpa: 1.0,
        division_factor: 1.0,
        flow_constant: 1.0,
        pressure_threshold: 0.5,
        flow_threshold: 0.5,
        calibration_samples: 4,
    };

    fn bus(sim: &SimHx710b) -> Hx710b<SimSck, SimDout, NoopDelay> {
        let (sck, dout) = sim.pins();
        Hx710b::new(sck, dout, NoopDelay, BusConfig::DEFAULT)
    }

    fn sensor(ch1: &SimHx710b, ch2: &SimHx710b) -> TestSensor {
        DualPressureSensor::new(bus(ch1), bus(ch2), CONFIG)
    }

    fn ids(frame: &MessageFramer) -> std::vec::Vec<SensorId> {
        frame.samples().iter().filter_map(|s| s.id()).collect()
    }

    #[test]
    fn test_init_calibrates_both_channels() {
        // Dummy read, then four calibration readings per channel.
        let ch1 = SimHx710b::new(&[0, 100, 102, 100, 102]);
        let ch2 = SimHx710b::new(&[0, -40, -40, -40, -41]);
        let clock = ManualClock::at(5_000);
        let mut sensor = sensor(&ch1, &ch2);

        assert_eq!(sensor.state(), DriverState::Uninitialized);
        assert_eq!(block_on(sensor.init(&clock)), Ok(()));

        assert_eq!(sensor.state(), DriverState::Ready);
        assert_eq!(sensor.calibration(0).map(|c| c.offset), Some(101));
        assert_eq!(sensor.calibration(1).map(|c| c.offset), Some(-40));
        assert_eq!(sensor.calibration(0).map(|c| c.last_sample_time), Some(5_000));
    }

    #[test]
    fn test_read_before_init_emits_nothing() {
        let ch1 = SimHx710b::new(&[10]);
        let ch2 = SimHx710b::new(&[10]);
        let mut sensor = sensor(&ch1, &ch2);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));

        assert_eq!(block_on(sensor.read_into(&mut frame, &ManualClock::default())), Ok(()));
        assert!(frame.is_empty());
        assert_eq!(ch1.frames_read(), 0);
    }

    #[test]
    fn test_read_emits_six_samples_in_channel_order() {
        let ch1 = SimHx710b::new(&[0, 0, 0, 0, 0, 4]);
        let ch2 = SimHx710b::new(&[0, 0, 0, 0, 0, -9]);
        let clock = ManualClock::at(0);
        let mut sensor = sensor(&ch1, &ch2);
        block_on(sensor.init(&clock)).unwrap();

        clock.advance_us(100_000);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));
        block_on(sensor.read_into(&mut frame, &clock)).unwrap();

        assert_eq!(
            ids(&frame),
            [
                SensorId::Pressure1,
                SensorId::Flow1,
                SensorId::Volume1,
                SensorId::Pressure2,
                SensorId::Flow2,
                SensorId::Volume2,
            ]
        );
        let values: std::vec::Vec<f32> = frame.samples().iter().map(|s| s.value).collect();
        // sqrt(4) = 2 over 0.1 s; sqrt(9) = 3 with the pressure's sign.
        assert_eq!(values[0], 4.0);
        assert_eq!(values[1], 2.0);
        assert!((values[2] - 0.2).abs() < 1e-6);
        assert_eq!(values[3], -9.0);
        assert_eq!(values[4], -3.0);
        assert!((values[5] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_absent_channel_is_skipped() {
        let ch1 = SimHx710b::new(&[0, 50]);
        let ch2 = SimHx710b::new(&[0]);
        ch2.set_ready(false);
        let clock = ManualClock::at(0);
        let mut sensor = sensor(&ch1, &ch2);

        assert_eq!(
            block_on(sensor.init(&clock)),
            Err(SensorError::InitializationFailed {
                sensor: NAME,
                details: "HX710B not responding",
            })
        );
        assert_eq!(sensor.state(), DriverState::Ready);
        assert!(sensor.is_present(0));
        assert!(!sensor.is_present(1));

        let mut frame = MessageFramer::new(DeviceIdentity::new(1));
        block_on(sensor.read_into(&mut frame, &clock)).unwrap();
        assert_eq!(ids(&frame), [SensorId::Pressure1, SensorId::Flow1, SensorId::Volume1]);
    }

    #[test]
    fn test_calibration_without_readings_disables_channel() {
        let ch1 = SimHx710b::new(&[0, 150_000]);
        let ch2 = SimHx710b::new(&[0, 7]);
        // Only the dummy read after reset gets through.
        ch1.stall_after(1);
        let clock = ManualClock::at(0);
        let mut sensor = sensor(&ch1, &ch2);

        assert_eq!(
            block_on(sensor.init(&clock)),
            Err(SensorError::InitializationFailed {
                sensor: NAME,
                details: "zero-offset calibration incomplete",
            })
        );
        assert_eq!(sensor.state(), DriverState::Ready);
        assert!(!sensor.is_present(0));
        assert!(!sensor.is_calibrated(0));
        assert!(sensor.is_calibrated(1));

        ch1.set_ready(true);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));
        block_on(sensor.read_into(&mut frame, &clock)).unwrap();
        assert_eq!(ids(&frame), [SensorId::Pressure2, SensorId::Flow2, SensorId::Volume2]);
    }

    #[test]
    fn test_partial_calibration_is_not_accepted() {
        // Dummy read plus two of the four calibration readings.
        let ch1 = SimHx710b::new(&[0, 10, 10]);
        let ch2 = SimHx710b::new(&[0]);
        ch1.stall_after(3);
        let clock = ManualClock::at(0);
        let mut sensor = sensor(&ch1, &ch2);

        assert!(matches!(
            block_on(sensor.init(&clock)),
            Err(SensorError::InitializationFailed { .. })
        ));
        assert!(!sensor.is_present(0));
        assert!(!sensor.is_calibrated(0));
        assert_eq!(sensor.calibration(0).map(|c| c.offset), Some(0));

        ch1.set_ready(true);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));
        block_on(sensor.read_into(&mut frame, &clock)).unwrap();
        assert!(!ids(&frame).contains(&SensorId::Pressure1));
        assert_eq!(ids(&frame).len(), 3);
    }

    #[test]
    fn test_timeout_on_one_channel_keeps_the_other() {
        let ch1 = SimHx710b::new(&[0]);
        let ch2 = SimHx710b::new(&[0]);
        let clock = ManualClock::at(0);
        let mut sensor = sensor(&ch1, &ch2);
        block_on(sensor.init(&clock)).unwrap();

        ch1.set_ready(false);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));
        assert_eq!(
            block_on(sensor.read_into(&mut frame, &clock)),
            Err(SensorError::Timeout {
                sensor: NAME,
                operation: "channel 1",
            })
        );
        assert_eq!(ids(&frame), [SensorId::Pressure2, SensorId::Flow2, SensorId::Volume2]);
    }

    #[test]
    fn test_reset_volume_zeroes_both_channels() {
        let ch1 = SimHx710b::new(&[0, 0, 0, 0, 0, 16]);
        let ch2 = SimHx710b::new(&[0, 0, 0, 0, 0, 16]);
        let clock = ManualClock::at(0);
        let mut sensor = sensor(&ch1, &ch2);
        block_on(sensor.init(&clock)).unwrap();

        clock.advance_us(500_000);
        let mut frame = MessageFramer::new(DeviceIdentity::new(1));
        block_on(sensor.read_into(&mut frame, &clock)).unwrap();
        assert!(sensor.calibration(0).unwrap().accumulated_volume > 0.0);

        clock.advance_us(1_000);
        sensor.reset_volume(&clock);
        for index in 0..2 {
            let state = sensor.calibration(index).unwrap();
            assert_eq!(state.accumulated_volume, 0.0);
            assert_eq!(state.last_sample_time, 501_000);
        }
    }
}
