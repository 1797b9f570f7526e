//! On-chip ADC1 channels shared between analog sensor drivers.

use core::cell::RefCell;

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::peripherals::ADC1;
use fisio_core::hal::AnalogInput;

pub type SharedAdc1 = RefCell<Adc<'static, ADC1<'static>, Blocking>>;

/// One ADC1 input. The converter itself is shared, so several channels can
/// be sampled from the same loop.
pub struct AnalogChannel<P> {
    adc: &'static SharedAdc1,
    pin: AdcPin<P, ADC1<'static>>,
}

impl<P: AdcChannel> AnalogChannel<P> {
    pub const fn new(adc: &'static SharedAdc1, pin: AdcPin<P, ADC1<'static>>) -> Self {
        Self { adc, pin }
    }
}

impl<P: AdcChannel> AnalogInput for AnalogChannel<P> {
    type Error = ();

    fn read_raw(&mut self) -> Result<u16, Self::Error> {
        let mut adc = self.adc.borrow_mut();
        nb::block!(adc.read_oneshot(&mut self.pin))
    }
}
