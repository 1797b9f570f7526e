//! Zero-offset calibration and the pressure → flow → volume chain
//!
//! Each differential pressure channel keeps its own [`CalibrationState`]:
//! the raw count measured with no airflow, the integrated volume and the
//! time base of the last integration step.
//!
//! Flow is derived from pressure with an orifice law,
//! `flow = sign(p) * k * sqrt(|p|)`, behind a two-stage deadband: small
//! pressures give zero flow, and so do flows that still come out small. The
//! square root amplifies offset noise near zero, which is what the second
//! stage catches.

use log::debug;

use crate::config::PressureConfig;

/// Per-channel calibration and integration state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationState {
    /// Raw count read with no airflow present.
    pub offset: i32,
    /// Integrated flow since the last reset.
    pub accumulated_volume: f32,
    /// Time base of the last integration step, microseconds.
    pub last_sample_time: u32,
}

/// Values derived from one raw pressure reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowReading {
    pub pressure_kpa: f32,
    pub flow: f32,
    pub volume: f32,
}

/// Averages quiescent raw readings into a zero offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetAccumulator {
    sum: i64,
    count: u32,
}

impl OffsetAccumulator {
    pub const fn new() -> Self {
        Self { sum: 0, count: 0 }
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    pub fn push(&mut self, raw: i32) {
        self.sum += i64::from(raw);
        self.count += 1;
    }

    /// Truncated mean of the readings, if there were any.
    pub fn mean(&self) -> Option<i32> {
        if self.count == 0 {
            return None;
        }
        Some((self.sum / i64::from(self.count)) as i32)
    }
}

/// Percentage to report after `done` of `total` calibration steps, if that
/// step crosses a decile boundary.
pub fn decile_progress(done: u32, total: u32) -> Option<u32> {
    if done == 0 || total == 0 {
        return None;
    }
    let decile = done * 10 / total;
    let previous = (done - 1) * 10 / total;
    (decile > previous).then_some(decile * 10)
}

/// Calibration and flow derivation for one pressure channel.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationEngine {
    config: PressureConfig,
    state: CalibrationState,
    calibrated: bool,
}

impl CalibrationEngine {
    pub const fn new(config: PressureConfig) -> Self {
        Self {
            config,
            state: CalibrationState {
                offset: 0,
                accumulated_volume: 0.0,
                last_sample_time: 0,
            },
            calibrated: false,
        }
    }

    pub const fn config(&self) -> &PressureConfig {
        &self.config
    }

    pub const fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub const fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Fix the zero offset and start the integration time base at `now_us`.
    pub fn complete(&mut self, offset: i32, now_us: u32) {
        self.state.offset = offset;
        self.state.last_sample_time = now_us;
        self.calibrated = true;
    }

    /// Offset-corrected pressure in kPa.
    pub fn pressure_kpa(&self, raw: i32) -> f32 {
        raw.saturating_sub(self.state.offset) as f32 * self.config.counts_to_kpa
            / self.config.division_factor
    }

    /// Flow for a pressure, with both deadband stages applied.
    pub fn flow(&self, pressure_kpa: f32) -> f32 {
        let magnitude = libm::fabsf(pressure_kpa);
        if magnitude < self.config.pressure_threshold {
            return 0.0;
        }

        let flow = libm::copysignf(
            self.config.flow_constant * libm::sqrtf(magnitude),
            pressure_kpa,
        );
        if libm::fabsf(flow) < self.config.flow_threshold {
            return 0.0;
        }
        flow
    }

    /// Integrate `flow` over the time since the previous step.
    ///
    /// Steps whose delta is not strictly between zero and one second are
    /// treated as a stalled or wrapped time base and skipped; the time base
    /// moves to `now_us` either way.
    pub fn integrate(&mut self, flow: f32, now_us: u32) -> f32 {
        let dt = now_us.wrapping_sub(self.state.last_sample_time) as f32 / 1_000_000.0;
        self.state.last_sample_time = now_us;

        if dt > 0.0 && dt < 1.0 && libm::fabsf(flow) >= self.config.flow_threshold {
            self.state.accumulated_volume += flow * dt;
        } else if dt >= 1.0 {
            debug!("Skipping integration step of {} s", dt);
        }
        self.state.accumulated_volume
    }

    /// Run the full chain on one raw reading. Returns `None` until the
    /// channel has been calibrated.
    pub fn process(&mut self, raw: i32, now_us: u32) -> Option<FlowReading> {
        if !self.calibrated {
            return None;
        }

        let pressure_kpa = self.pressure_kpa(raw);
        let flow = self.flow(pressure_kpa);
        let volume = self.integrate(flow, now_us);

        Some(FlowReading {
            pressure_kpa,
            flow,
            volume,
        })
    }

    /// Zero the integrated volume and restart the time base.
    pub fn reset_volume(&mut self, now_us: u32) {
        self.state.accumulated_volume = 0.0;
        self.state.last_sample_time = now_us;
    }
}
