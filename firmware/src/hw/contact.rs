//! Analog contact sensor on PA0.

use accessory_core::input::RawSample;
use embassy_stm32::adc::{Adc, AnyAdcChannel, Resolution, SampleTime};
use embassy_stm32::peripherals::ADC1;

use crate::clock::FirmwareInstant;

pub struct ContactSensorAdc<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
    discard_next: bool,
}

impl<'d> ContactSensorAdc<'d> {
    /// Configures 10-bit conversions so the default threshold of 512 sits at mid-scale.
    pub fn new(mut adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>) -> Self {
        adc.set_resolution(Resolution::BITS10);
        adc.set_sample_time(SampleTime::CYCLES79_5);
        Self {
            adc,
            channel,
            discard_next: true,
        }
    }

    pub fn read(&mut self, now: FirmwareInstant) -> RawSample<FirmwareInstant> {
        // First conversion after power-up reads low while the sample cap charges.
        if self.discard_next {
            let _ = self.adc.blocking_read(&mut self.channel);
            self.discard_next = false;
        }

        RawSample::analog(now, self.adc.blocking_read(&mut self.channel))
    }
}
