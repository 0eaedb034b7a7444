//! Identify blink pattern.
//!
//! Three groups of two 100 ms flashes, each group followed by a 250 ms pause,
//! on the status LED. Roughly two seconds end to end.

use core::time::Duration;

use crate::outputs::OutputId;

use super::{BlinkPatternKind, BlinkStep, BlinkTemplate};

/// On and off time of a single flash.
pub const IDENTIFY_FLASH: Duration = Duration::from_millis(100);
/// Dark gap separating flash groups.
pub const IDENTIFY_PAUSE: Duration = Duration::from_millis(250);
pub const IDENTIFY_GROUPS: usize = 3;
pub const IDENTIFY_FLASHES_PER_GROUP: usize = 2;

const FLASH_ON: BlinkStep = BlinkStep::on(IDENTIFY_FLASH);
const FLASH_OFF: BlinkStep = BlinkStep::off(IDENTIFY_FLASH);
const PAUSE: BlinkStep = BlinkStep::off(IDENTIFY_PAUSE);

/// Ordered steps for the identify pattern.
pub const IDENTIFY_STEPS: [BlinkStep; 15] = [
    FLASH_ON, FLASH_OFF, FLASH_ON, FLASH_OFF, PAUSE, //
    FLASH_ON, FLASH_OFF, FLASH_ON, FLASH_OFF, PAUSE, //
    FLASH_ON, FLASH_OFF, FLASH_ON, FLASH_OFF, PAUSE,
];

pub const IDENTIFY_TEMPLATE: BlinkTemplate =
    BlinkTemplate::new(BlinkPatternKind::Identify, OutputId::StatusLed, &IDENTIFY_STEPS);

/// Returns the shared identify template.
#[must_use]
pub const fn identify_template() -> BlinkTemplate {
    IDENTIFY_TEMPLATE
}
