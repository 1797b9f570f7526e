//! Hardware stand-ins shared by the unit tests.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::hal::{AnalogInput, Clock, ExternalAdc, Transport};

/// Delay provider that returns immediately.
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Armed,
    Shifting { pulses: u32 },
}

struct SimState {
    ready: bool,
    sck_high: bool,
    phase: Phase,
    current: u32,
    pending: VecDeque<u32>,
    frames_read: u32,
    pulses_per_frame: u32,
    stall_after: Option<u32>,
}

impl SimState {
    fn data_bit(&self) -> bool {
        match self.phase {
            Phase::Idle => !self.ready,
            Phase::Armed => false,
            Phase::Shifting { pulses } if pulses <= 24 => (self.current >> (24 - pulses)) & 1 == 1,
            Phase::Shifting { .. } => true,
        }
    }

    fn finish_frame(&mut self, pulses: u32) {
        self.frames_read += 1;
        self.pulses_per_frame = pulses;
        if let Some(next) = self.pending.pop_front() {
            self.current = next;
        }
        if self.stall_after == Some(self.frames_read) {
            self.ready = false;
        }
        self.phase = Phase::Idle;
    }
}

/// Simulated HX710B: answers the clock/data protocol with queued values.
///
/// The last queued value repeats once the queue runs dry.
#[derive(Clone)]
pub struct SimHx710b {
    state: Rc<RefCell<SimState>>,
}

impl SimHx710b {
    pub fn new(values: &[i32]) -> Self {
        let mut pending: VecDeque<u32> = values.iter().map(|v| *v as u32 & 0xFF_FFFF).collect();
        let current = pending.pop_front().unwrap_or(0);
        Self {
            state: Rc::new(RefCell::new(SimState {
                ready: true,
                sck_high: false,
                phase: Phase::Idle,
                current,
                pending,
                frames_read: 0,
                pulses_per_frame: 0,
                stall_after: None,
            })),
        }
    }

    pub fn pins(&self) -> (SimSck, SimDout) {
        (
            SimSck {
                state: self.state.clone(),
            },
            SimDout {
                state: self.state.clone(),
            },
        )
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// Hold DOUT high once `frames` conversions have been clocked out.
    pub fn stall_after(&self, frames: u32) {
        self.state.borrow_mut().stall_after = Some(frames);
    }

    pub fn frames_read(&self) -> u32 {
        self.state.borrow().frames_read
    }

    pub fn pulses_per_frame(&self) -> u32 {
        self.state.borrow().pulses_per_frame
    }
}

pub struct SimSck {
    state: Rc<RefCell<SimState>>,
}

impl ErrorType for SimSck {
    type Error = Infallible;
}

impl OutputPin for SimSck {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if !state.sck_high {
            state.phase = match state.phase {
                Phase::Idle => Phase::Idle,
                Phase::Armed => Phase::Shifting { pulses: 1 },
                Phase::Shifting { pulses } => Phase::Shifting { pulses: pulses + 1 },
            };
        }
        state.sck_high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.sck_high {
            if let Phase::Shifting { pulses } = state.phase {
                if pulses >= 25 {
                    state.finish_frame(pulses);
                }
            }
        }
        state.sck_high = false;
        Ok(())
    }
}

pub struct SimDout {
    state: Rc<RefCell<SimState>>,
}

impl ErrorType for SimDout {
    type Error = Infallible;
}

impl InputPin for SimDout {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.state.borrow_mut();
        if state.phase == Phase::Idle && state.ready {
            state.phase = Phase::Armed;
        }
        Ok(state.data_bit())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Input pin stuck at one level.
pub struct FixedInput {
    high: bool,
}

impl FixedInput {
    pub const fn high() -> Self {
        Self { high: true }
    }

    pub const fn low() -> Self {
        Self { high: false }
    }
}

impl ErrorType for FixedInput {
    type Error = Infallible;
}

impl InputPin for FixedInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

/// Clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    micros: Cell<u32>,
}

impl ManualClock {
    pub fn at(micros: u32) -> Self {
        Self {
            micros: Cell::new(micros),
        }
    }

    pub fn advance_us(&self, us: u32) {
        self.micros.set(self.micros.get().wrapping_add(us));
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u32 {
        self.micros.get()
    }

    fn now_millis(&self) -> u32 {
        self.micros.get() / 1_000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault;

/// External ADC replaying scripted conversion results.
pub struct ScriptedAdc {
    present: bool,
    readings: VecDeque<Result<i16, Fault>>,
    pub address: Option<u8>,
    pub channels_read: Vec<u8>,
}

impl ScriptedAdc {
    pub fn new(readings: &[Result<i16, Fault>]) -> Self {
        Self {
            present: true,
            readings: readings.iter().copied().collect(),
            address: None,
            channels_read: Vec::new(),
        }
    }

    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new(&[])
        }
    }
}

impl ExternalAdc for ScriptedAdc {
    type Error = Fault;

    fn begin(&mut self, address: u8) -> Result<(), Fault> {
        self.address = Some(address);
        if self.present { Ok(()) } else { Err(Fault) }
    }

    fn read_single_ended(&mut self, channel: u8) -> Result<i16, Fault> {
        self.channels_read.push(channel);
        self.readings.pop_front().unwrap_or(Err(Fault))
    }

    fn compute_volts(&self, code: i16) -> f32 {
        f32::from(code) * 1.024 / 32_768.0
    }
}

/// Analog pin replaying scripted codes, failing once they run out.
pub struct ScriptedAnalog {
    codes: VecDeque<u16>,
    pub reads: u32,
}

impl ScriptedAnalog {
    pub fn new(codes: &[u16]) -> Self {
        Self {
            codes: codes.iter().copied().collect(),
            reads: 0,
        }
    }
}

impl AnalogInput for ScriptedAnalog {
    type Error = Fault;

    fn read_raw(&mut self) -> Result<u16, Fault> {
        self.reads += 1;
        self.codes.pop_front().ok_or(Fault)
    }
}

/// Transport that keeps every frame it is given.
#[derive(Default)]
pub struct RecordingTransport {
    fail: bool,
    pub frames: Vec<Vec<u8>>,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            frames: Vec::new(),
        }
    }
}

impl Transport for RecordingTransport {
    type Error = Fault;

    async fn send(&mut self, frame: &[u8]) -> Result<(), Fault> {
        if self.fail {
            return Err(Fault);
        }
        self.frames.push(frame.to_vec());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cFault;

impl embedded_hal::i2c::Error for I2cFault {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        embedded_hal::i2c::ErrorKind::NoAcknowledge(
            embedded_hal::i2c::NoAcknowledgeSource::Address,
        )
    }
}

struct I2cState {
    address: u8,
    pointer: u8,
    conversion: u16,
    config: u16,
    busy: bool,
    last_config: Option<u16>,
}

/// ADS1115 register file behind an I2C bus.
#[derive(Clone)]
pub struct SimI2c {
    state: Rc<RefCell<I2cState>>,
}

impl SimI2c {
    pub fn new(address: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(I2cState {
                address,
                pointer: 0,
                conversion: 0,
                config: 0x8583,
                busy: false,
                last_config: None,
            })),
        }
    }

    pub fn set_conversion(&self, code: u16) {
        self.state.borrow_mut().conversion = code;
    }

    pub fn set_busy(&self, busy: bool) {
        self.state.borrow_mut().busy = busy;
    }

    pub fn last_config(&self) -> Option<u16> {
        self.state.borrow().last_config
    }
}

impl embedded_hal::i2c::ErrorType for SimI2c {
    type Error = I2cFault;
}

impl embedded_hal::i2c::I2c for SimI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> Result<(), I2cFault> {
        let mut state = self.state.borrow_mut();
        if address != state.address {
            return Err(I2cFault);
        }

        for op in operations.iter_mut() {
            match op {
                embedded_hal::i2c::Operation::Write(bytes) => {
                    if let Some(reg) = bytes.first() {
                        state.pointer = *reg;
                    }
                    if let [0x01, hi, lo] = &bytes[..] {
                        let config = u16::from_be_bytes([*hi, *lo]);
                        state.config = config;
                        state.last_config = Some(config);
                    }
                }
                embedded_hal::i2c::Operation::Read(buf) => {
                    let value = match state.pointer {
                        0x00 => state.conversion,
                        _ if state.busy => state.config & !0x8000,
                        _ => state.config | 0x8000,
                    };
                    let bytes = value.to_be_bytes();
                    let n = buf.len().min(2);
                    buf[..n].copy_from_slice(&bytes[..n]);
                }
            }
        }
        Ok(())
    }
}

std::thread_local! {
    static CAPTURED: RefCell<Vec<(log::Level, std::string::String)>> = const { RefCell::new(Vec::new()) };
}

/// Logger that keeps records per test thread.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = std::format!("{}", record.args());
        CAPTURED.with(|captured| captured.borrow_mut().push((record.level(), line)));
    }

    fn flush(&self) {}
}

static CAPTURE_LOGGER: CaptureLogger = CaptureLogger;

/// Start capturing log records emitted on the current thread.
pub fn capture_logs() {
    static INSTALL: std::sync::Once = std::sync::Once::new();
    INSTALL.call_once(|| {
        if log::set_logger(&CAPTURE_LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    CAPTURED.with(|captured| captured.borrow_mut().clear());
}

/// Records captured on this thread at `level`.
pub fn captured_logs(level: log::Level) -> Vec<std::string::String> {
    CAPTURED.with(|captured| {
        captured
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    })
}
