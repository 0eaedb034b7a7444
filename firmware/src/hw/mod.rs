//! Board wiring: relay and status LED outputs, button and contact sensor inputs.

use accessory_core::input::{InputId, InputSource, Level, RawSample, TransientSampleError};
use accessory_core::outputs::{OutputId, OutputSink};
use embassy_stm32::gpio::{self, Input, Output};

use crate::clock::FirmwareInstant;

mod contact;

pub use contact::ContactSensorAdc;

/// Push-pull outputs for the relay (PB4) and the status LED (PA5).
pub struct GpioOutputs<'d> {
    relay: Output<'d>,
    status_led: Output<'d>,
}

impl<'d> GpioOutputs<'d> {
    pub fn new(relay: Output<'d>, status_led: Output<'d>) -> Self {
        Self { relay, status_led }
    }
}

impl OutputSink for GpioOutputs<'_> {
    fn set_output(&mut self, pin: OutputId, level: Level) {
        let level = match level {
            Level::High => gpio::Level::High,
            Level::Low => gpio::Level::Low,
        };
        match pin {
            OutputId::Relay => self.relay.set_level(level),
            OutputId::StatusLed => self.status_led.set_level(level),
        }
    }
}

/// Physical input polled by a sampling task.
pub enum BoardInput<'d> {
    /// Push button to ground on PC13 with the internal pull-up.
    Button(Input<'d>),
    ContactSensor(ContactSensorAdc<'d>),
}

impl InputSource for BoardInput<'_> {
    type Instant = FirmwareInstant;

    fn input(&self) -> InputId {
        match self {
            BoardInput::Button(_) => InputId::Button,
            BoardInput::ContactSensor(_) => InputId::ContactSensor,
        }
    }

    fn poll(&mut self, now: FirmwareInstant) -> Result<RawSample<FirmwareInstant>, TransientSampleError> {
        match self {
            BoardInput::Button(pin) => Ok(RawSample::digital(now, Level::from_bool(pin.is_high()))),
            BoardInput::ContactSensor(adc) => Ok(adc.read(now)),
        }
    }
}
