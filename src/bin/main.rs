#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::yield_now;
use esp_hal::clock::CpuClock;
#[allow(unused_imports)]
use esp_hal::delay::Delay;
#[allow(unused_imports)]
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig};
use esp_hal::timer::timg::TimerGroup;
use log::{debug, error, info};

use fisio_core::config::DeviceConfig;
#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-ecg-analog"))]
use fisio_core::sensors::LeadIds;
use fisio_core::dispatcher::Acquisition;
use fisio_rs::app_state::{self, AppError, SensorsState};
use fisio_rs::clock::EmbassyClock;
use fisio_rs::serial::SerialTransport;

#[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-emg-ads1115"))]
use {
    embedded_hal_bus::i2c::RefCellDevice, fisio_core::ads1115::Ads1115,
    fisio_core::config::AdcChannelConfig, fisio_core::sensors::I2cChannelSensor,
};
#[cfg(any(feature = "sensor-ecg-analog", feature = "sensor-emg-analog"))]
use {
    esp_hal::analog::adc::{Adc, AdcConfig, Attenuation},
    fisio_core::config::AnalogConfig,
    fisio_core::sensors::DirectAnalogSensor,
    fisio_rs::analog::AnalogChannel,
};
#[cfg(feature = "sensor-dual-pressure")]
use {fisio_core::config::PressureConfig, fisio_core::sensors::DualPressureSensor};

const DEVICE_ID: u16 = match u16::from_str_radix(env!("FISIO_DEVICE_ID"), 10) {
    Ok(id) => id,
    Err(_) => panic!("FISIO_DEVICE_ID is not a u16"),
};

const SERIAL_BAUD: u32 = match u32::from_str_radix(env!("FISIO_SERIAL_BAUD"), 10) {
    Ok(baud) => baud,
    Err(_) => panic!("FISIO_SERIAL_BAUD is not a u32"),
};

const DEVICE: DeviceConfig = DeviceConfig {
    device_id: DEVICE_ID,
    serial_baud: SERIAL_BAUD,
};

#[cfg(feature = "sensor-ecg-ads1115")]
const ECG_ADC: AdcChannelConfig = AdcChannelConfig::DEFAULT;

// Shares the ECG converter when both run over I2C.
#[cfg(feature = "sensor-emg-ads1115")]
const EMG_ADC: AdcChannelConfig = AdcChannelConfig {
    channel: if cfg!(feature = "sensor-ecg-ads1115") { 1 } else { 0 },
    ..AdcChannelConfig::DEFAULT
};

/// Cycles between statistics log lines.
const STATS_INTERVAL: u32 = 10_000;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

fn halt(e: AppError) -> ! {
    error!("Startup failed: {}", e);
    loop {
        core::hint::spin_loop();
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("========================================");
    info!("fisio-rs {}", env!("CARGO_PKG_VERSION"));
    info!("Device ID: {:#06x}", DEVICE.device_id);
    info!("========================================");

    let uart = app_state::create_uart(
        peripherals.UART0,
        peripherals.GPIO43,
        peripherals.GPIO44,
        DEVICE.serial_baud,
    )
    .unwrap_or_else(|e| halt(e));

    #[allow(unused_variables)]
    let delay = Delay::new();

    #[cfg(any(feature = "sensor-ecg-ads1115", feature = "sensor-emg-ads1115"))]
    let i2c_bus = app_state::share_i2c(
        app_state::create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11)
            .unwrap_or_else(|e| halt(e)),
    );

    #[cfg(any(feature = "sensor-ecg-analog", feature = "sensor-emg-analog"))]
    let mut adc1_config = AdcConfig::new();
    #[cfg(feature = "sensor-ecg-analog")]
    let ecg_pin = adc1_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    #[cfg(feature = "sensor-emg-analog")]
    let emg_pin = adc1_config.enable_pin(peripherals.GPIO9, Attenuation::_11dB);
    #[cfg(any(feature = "sensor-ecg-analog", feature = "sensor-emg-analog"))]
    let adc1 = app_state::share_adc1(Adc::new(peripherals.ADC1, adc1_config));

    let mut sensors = SensorsState {
        #[cfg(feature = "sensor-dual-pressure")]
        pressure: DualPressureSensor::new(
            app_state::pressure_bus(
                Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
                Input::new(peripherals.GPIO5, InputConfig::default()),
                delay,
            ),
            app_state::pressure_bus(
                Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default()),
                Input::new(peripherals.GPIO7, InputConfig::default()),
                delay,
            ),
            PressureConfig::DEFAULT,
        ),

        #[cfg(feature = "sensor-ecg-ads1115")]
        ecg: I2cChannelSensor::ecg(
            Ads1115::new(RefCellDevice::new(i2c_bus), delay, ECG_ADC.gain),
            ECG_ADC,
        )
        .with_lead_detect(
            Input::new(peripherals.GPIO2, InputConfig::default()),
            Input::new(peripherals.GPIO3, InputConfig::default()),
            LeadIds::ECG,
        ),

        #[cfg(feature = "sensor-ecg-analog")]
        ecg: DirectAnalogSensor::ecg(AnalogChannel::new(adc1, ecg_pin), AnalogConfig::DEFAULT)
            .with_lead_detect(
                Input::new(peripherals.GPIO2, InputConfig::default()),
                Input::new(peripherals.GPIO3, InputConfig::default()),
                LeadIds::ECG,
            ),

        #[cfg(feature = "sensor-emg-ads1115")]
        emg: I2cChannelSensor::emg(
            Ads1115::new(RefCellDevice::new(i2c_bus), delay, EMG_ADC.gain),
            EMG_ADC,
        ),

        #[cfg(feature = "sensor-emg-analog")]
        emg: DirectAnalogSensor::emg(AnalogChannel::new(adc1, emg_pin), AnalogConfig::DEFAULT),
    };
    sensors.log_active();

    let mut acquisition = Acquisition::new(
        DEVICE.identity(),
        SerialTransport::new(uart),
        EmbassyClock,
    );
    acquisition.start(&mut sensors).await;
    info!("Streaming frames");

    loop {
        acquisition.run_cycle(&mut sensors).await;

        let stats = acquisition.stats();
        if stats.cycles % STATS_INTERVAL == 0 {
            debug!(
                "{} cycles, {} frames, {} transport failures, {} samples dropped",
                stats.cycles, stats.frames_sent, stats.transport_failures, stats.samples_dropped
            );
        }

        yield_now().await;
    }
}
