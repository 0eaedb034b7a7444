//! Factory reset feedback pattern and stage timing.

use core::time::Duration;

use crate::outputs::OutputId;

use super::{BlinkPatternKind, BlinkStep, BlinkTemplate};

pub const RESET_FLASH: Duration = Duration::from_millis(100);
/// Pause after each clear stage before moving on.
pub const RESET_STAGE_SETTLE: Duration = Duration::from_millis(1_000);
/// Longest wait for a collaborator to confirm a clear.
pub const RESET_CLEAR_TIMEOUT: Duration = Duration::from_secs(5);

const FLASH_ON: BlinkStep = BlinkStep::on(RESET_FLASH);
const FLASH_OFF: BlinkStep = BlinkStep::off(RESET_FLASH);

/// Three quick flashes announcing the reset.
pub const RESET_FEEDBACK_STEPS: [BlinkStep; 6] =
    [FLASH_ON, FLASH_OFF, FLASH_ON, FLASH_OFF, FLASH_ON, FLASH_OFF];

pub const RESET_FEEDBACK_TEMPLATE: BlinkTemplate = BlinkTemplate::new(
    BlinkPatternKind::ResetFeedback,
    OutputId::StatusLed,
    &RESET_FEEDBACK_STEPS,
);

#[must_use]
pub const fn reset_feedback_template() -> BlinkTemplate {
    RESET_FEEDBACK_TEMPLATE
}

/// Timing of the clear stages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResetTiming {
    /// Delay after a clear completes (or is given up on) before the next stage.
    pub settle: Duration,
    /// Bound on waiting for a pending clear to be confirmed.
    pub clear_timeout: Duration,
}

impl ResetTiming {
    pub const DEFAULT: Self = Self::new(RESET_STAGE_SETTLE, RESET_CLEAR_TIMEOUT);

    pub const fn new(settle: Duration, clear_timeout: Duration) -> Self {
        Self {
            settle,
            clear_timeout,
        }
    }

    /// Worst-case time spent in one clear stage.
    #[must_use]
    pub fn stage_bound(&self) -> Duration {
        self.clear_timeout + self.settle
    }
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_flashes_three_times() {
        assert_eq!(RESET_FEEDBACK_TEMPLATE.flash_count(), 3);
        assert_eq!(
            RESET_FEEDBACK_TEMPLATE.total_duration(),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn default_timing_bounds_each_stage() {
        assert_eq!(ResetTiming::default().stage_bound(), Duration::from_secs(6));
    }
}
