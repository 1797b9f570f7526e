//! Desktop simulator for the fisio-rs acquisition pipeline.
//!
//! Runs the real `fisio-core` drivers, framer and decoder against synthetic
//! hardware, so calibration, flow/volume derivation and framing can be
//! watched without a board:
//!
//! - two emulated HX710B chips, bit-banged exactly like the real ones, fed
//!   by a sinusoidal breathing pattern
//! - an ECG front end on a fake 12-bit analog pin, with a lead-off period
//! - a transport that decodes every frame it is handed
//!
//! # Usage
//!
//! | Argument | Meaning        | Default |
//! |----------|----------------|---------|
//! | 1st      | seconds to run | 20      |
//!
//! Set `RUST_LOG=info` for the per-second summary, `RUST_LOG=debug` for
//! every frame.

use std::cell::RefCell;
use std::convert::Infallible;
use std::f32::consts::TAU;
use std::rc::Rc;
use std::time::{Duration, Instant};

use embassy_futures::block_on;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use log::{debug, info, warn};

use fisio_core::bus::Hx710b;
use fisio_core::config::{AnalogConfig, BusConfig, DeviceConfig, PressureConfig};
use fisio_core::dispatcher::Acquisition;
use fisio_core::hal::{AnalogInput, Clock, Transport};
use fisio_core::protocol::{FrameDecoder, SensorId};
use fisio_core::sensors::{DirectAnalogSensor, DualPressureSensor, LeadIds};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

const DEFAULT_RUN_SECS: u64 = 20;

/// Pause between acquisition cycles.
const CYCLE_PERIOD: Duration = Duration::from_millis(1);

/// Interval between summary log lines.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// No airflow before this point, so calibration sees a still airway.
const QUIET_SECS: f32 = 1.0;

const BREATH_PERIOD_SECS: f32 = 4.0;
const PEAK_FLOW: f32 = 2.0;

/// Zero-flow raw counts of each pressure channel.
const RAW_OFFSETS: [i32; 2] = [152_000, -87_500];

/// Channel 2 sits slightly downstream and sees a bit less flow.
const CHANNEL_GAIN: [f32; 2] = [1.0, 0.95];

const NOISE_COUNTS: u32 = 15;

const HEART_RATE_BPM: f32 = 72.0;

/// LO+ electrode detached between these times, in seconds.
const LEAD_OFF_SECS: (f32, f32) = (9.0, 11.0);

// ---------------------------------------------------------------------------
// Host time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct HostClock {
    start: Instant,
}

impl HostClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

impl Clock for HostClock {
    fn now_micros(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }

    fn now_millis(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

/// Sleeps for millisecond delays; bit timing of the emulated chips needs
/// no real wait.
#[derive(Debug, Clone, Copy)]
struct HostDelay;

impl DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        if ns >= 1_000_000 {
            std::thread::sleep(Duration::from_nanos(u64::from(ns)));
        }
    }
}

// ---------------------------------------------------------------------------
// Breathing model
// ---------------------------------------------------------------------------

/// Flow at `t` seconds: still, then sinusoidal breaths (positive = exhale).
fn breath_flow(t: f32) -> f32 {
    if t < QUIET_SECS {
        return 0.0;
    }
    PEAK_FLOW * (TAU * (t - QUIET_SECS) / BREATH_PERIOD_SECS).sin()
}

/// Raw HX710B counts that produce `flow` through the pressure chain.
fn flow_to_counts(channel: usize, flow: f32, config: &PressureConfig) -> i32 {
    let flow = flow * CHANNEL_GAIN[channel];
    let kpa = (flow / config.flow_constant).powi(2).copysign(flow);
    RAW_OFFSETS[channel] + (kpa * config.division_factor / config.counts_to_kpa) as i32
}

// ---------------------------------------------------------------------------
// Emulated HX710B
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Armed,
    Shifting { pulses: u32 },
}

struct ChipState {
    channel: usize,
    clock: HostClock,
    config: PressureConfig,
    phase: Phase,
    sck_high: bool,
    latched: u32,
    noise: u32,
}

impl ChipState {
    fn next_noise(&mut self) -> i32 {
        // xorshift32
        self.noise ^= self.noise << 13;
        self.noise ^= self.noise >> 17;
        self.noise ^= self.noise << 5;
        (self.noise % (2 * NOISE_COUNTS + 1)) as i32 - NOISE_COUNTS as i32
    }

    fn latch(&mut self) {
        let flow = breath_flow(self.clock.secs());
        let counts = flow_to_counts(self.channel, flow, &self.config) + self.next_noise();
        self.latched = counts as u32 & 0xFF_FFFF;
    }
}

/// One emulated chip, split into its clock input and data output.
fn emulated_hx710b(
    channel: usize,
    clock: HostClock,
    config: PressureConfig,
) -> (EmulatedSck, EmulatedDout) {
    let state = Rc::new(RefCell::new(ChipState {
        channel,
        clock,
        config,
        phase: Phase::Idle,
        sck_high: false,
        latched: 0,
        noise: 0x9E37_79B9 ^ channel as u32,
    }));
    (
        EmulatedSck {
            state: state.clone(),
        },
        EmulatedDout { state },
    )
}

struct EmulatedSck {
    state: Rc<RefCell<ChipState>>,
}

impl ErrorType for EmulatedSck {
    type Error = Infallible;
}

impl OutputPin for EmulatedSck {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.state.borrow_mut();
        if !chip.sck_high {
            let next = match chip.phase {
                Phase::Idle => Phase::Idle,
                Phase::Armed => {
                    chip.latch();
                    Phase::Shifting { pulses: 1 }
                }
                Phase::Shifting { pulses } => Phase::Shifting { pulses: pulses + 1 },
            };
            chip.phase = next;
        }
        chip.sck_high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.state.borrow_mut();
        if chip.sck_high {
            if let Phase::Shifting { pulses } = chip.phase {
                if pulses >= 25 {
                    chip.phase = Phase::Idle;
                }
            }
        }
        chip.sck_high = false;
        Ok(())
    }
}

struct EmulatedDout {
    state: Rc<RefCell<ChipState>>,
}

impl ErrorType for EmulatedDout {
    type Error = Infallible;
}

impl InputPin for EmulatedDout {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut chip = self.state.borrow_mut();
        // A conversion is always waiting.
        if chip.phase == Phase::Idle {
            chip.phase = Phase::Armed;
        }
        Ok(match chip.phase {
            Phase::Shifting { pulses } if pulses <= 24 => (chip.latched >> (24 - pulses)) & 1 == 1,
            Phase::Shifting { .. } => true,
            _ => false,
        })
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

// ---------------------------------------------------------------------------
// Synthetic ECG front end
// ---------------------------------------------------------------------------

/// 12-bit codes of a PQRST-shaped trace centred at mid-scale.
struct SyntheticEcg {
    clock: HostClock,
}

impl SyntheticEcg {
    /// (position in beat, amplitude, width) of the P, Q, R, S and T waves.
    const WAVES: [(f32, f32, f32); 5] = [
        (0.20, 0.10, 0.025),
        (0.35, -0.15, 0.010),
        (0.38, 1.20, 0.012),
        (0.41, -0.25, 0.010),
        (0.65, 0.30, 0.040),
    ];

    fn millivolts(beat_phase: f32) -> f32 {
        Self::WAVES
            .iter()
            .map(|(center, amplitude, width)| {
                let x = (beat_phase - center) / width;
                amplitude * (-0.5 * x * x).exp()
            })
            .sum()
    }
}

impl AnalogInput for SyntheticEcg {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let beat_phase = (self.clock.secs() * HEART_RATE_BPM / 60.0).fract();
        let code = 2048.0 + Self::millivolts(beat_phase) * 600.0;
        Ok(code.clamp(0.0, 4095.0) as u16)
    }
}

/// Electrode contact line: LOW while attached.
struct ContactLine {
    clock: HostClock,
    detaches: bool,
}

impl ErrorType for ContactLine {
    type Error = Infallible;
}

impl InputPin for ContactLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let t = self.clock.secs();
        Ok(self.detaches && t >= LEAD_OFF_SECS.0 && t < LEAD_OFF_SECS.1)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

// ---------------------------------------------------------------------------
// Receiving side
// ---------------------------------------------------------------------------

/// Feeds every frame through the streaming decoder, as the host would.
struct DecodingTransport {
    decoder: FrameDecoder,
    latest: [Option<f32>; 256],
    frames: u32,
    bytes: usize,
    decode_errors: u32,
}

impl DecodingTransport {
    fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
            latest: [None; 256],
            frames: 0,
            bytes: 0,
            decode_errors: 0,
        }
    }

    fn latest(&self, id: SensorId) -> f32 {
        self.latest[u8::from(id) as usize].unwrap_or(f32::NAN)
    }
}

impl Transport for DecodingTransport {
    type Error = Infallible;

    async fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.bytes += frame.len();
        self.decoder.extend(frame);

        while let Some(result) = self.decoder.next_frame() {
            match result {
                Ok(decoded) => {
                    self.frames += 1;
                    for sample in decoded.samples.iter() {
                        self.latest[sample.sensor_id as usize] = Some(sample.value);
                    }
                    debug!(
                        "Frame from {:#06x} at {} ms: {} samples",
                        decoded.identity.get(),
                        decoded.timestamp_ms,
                        decoded.samples.len()
                    );
                }
                Err(e) => {
                    self.decode_errors += 1;
                    warn!("Decoder rejected frame: {}", e);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run_secs() -> u64 {
    match std::env::args().nth(1) {
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            warn!("Invalid duration {:?}, using {} s", arg, DEFAULT_RUN_SECS);
            DEFAULT_RUN_SECS
        }),
        None => DEFAULT_RUN_SECS,
    }
}

fn main() {
    env_logger::init();

    let run_secs = run_secs();
    let device = DeviceConfig::DEFAULT;
    let pressure = PressureConfig::DEFAULT;
    let clock = HostClock::new();

    info!("Starting fisio-rs simulator");
    info!("Device ID: {:#06x}, running {} s", device.device_id, run_secs);

    let (sck_1, dout_1) = emulated_hx710b(0, clock, pressure);
    let (sck_2, dout_2) = emulated_hx710b(1, clock, pressure);

    let mut sensors = (
        DualPressureSensor::new(
            Hx710b::new(sck_1, dout_1, HostDelay, BusConfig::DEFAULT),
            Hx710b::new(sck_2, dout_2, HostDelay, BusConfig::DEFAULT),
            pressure,
        ),
        DirectAnalogSensor::ecg(SyntheticEcg { clock }, AnalogConfig::DEFAULT).with_lead_detect(
            ContactLine {
                clock,
                detaches: true,
            },
            ContactLine {
                clock,
                detaches: false,
            },
            LeadIds::ECG,
        ),
    );

    let mut acquisition = Acquisition::new(device.identity(), DecodingTransport::new(), clock);
    block_on(acquisition.start(&mut sensors));

    let deadline = Instant::now() + Duration::from_secs(run_secs);
    let mut last_report = Instant::now();
    let mut breath = 0u32;
    let mut peak_volume = 0.0f32;

    while Instant::now() < deadline {
        block_on(acquisition.run_cycle(&mut sensors));

        let transport = acquisition.transport();
        peak_volume = peak_volume.max(transport.latest(SensorId::Volume1));

        // Start every breath from zero volume.
        let t = clock.secs();
        if t >= QUIET_SECS {
            let current = ((t - QUIET_SECS) / BREATH_PERIOD_SECS) as u32;
            if current > breath {
                info!("Breath {}: peak volume {:.3}", breath + 1, peak_volume);
                sensors.0.reset_volume(&clock);
                breath = current;
                peak_volume = 0.0;
            }
        }

        if last_report.elapsed() >= REPORT_INTERVAL {
            let transport = acquisition.transport();
            info!(
                "t={:5.1}s  P1={:+.4} kPa F1={:+.3} V1={:+.3}  P2={:+.4} kPa F2={:+.3} V2={:+.3}  ECG={:4.0} LD+={} LD-={}",
                t,
                transport.latest(SensorId::Pressure1),
                transport.latest(SensorId::Flow1),
                transport.latest(SensorId::Volume1),
                transport.latest(SensorId::Pressure2),
                transport.latest(SensorId::Flow2),
                transport.latest(SensorId::Volume2),
                transport.latest(SensorId::EcgCh1),
                transport.latest(SensorId::EcgLeadPlus),
                transport.latest(SensorId::EcgLeadMinus),
            );
            last_report = Instant::now();
        }

        std::thread::sleep(CYCLE_PERIOD);
    }

    let stats = acquisition.stats();
    let transport = acquisition.transport();
    info!(
        "Done: {} cycles, {} frames sent, {} decoded ({} bytes), {} decode errors, {} samples dropped",
        stats.cycles,
        stats.frames_sent,
        transport.frames,
        transport.bytes,
        transport.decode_errors,
        stats.samples_dropped
    );
}
