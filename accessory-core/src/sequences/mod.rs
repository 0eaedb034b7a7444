//! Blink templates shared by firmware and host targets.
//!
//! Templates are `const` step lists walked by the sequencers in
//! [`crate::sequencer`]. Nothing here touches hardware.

use core::fmt;
use core::time::Duration;

use crate::outputs::{OutputId, OutputLine, OutputOwner, output_by_id};

pub mod identify;
pub mod reset;

pub use identify::{IDENTIFY_TEMPLATE, identify_template};
pub use reset::{RESET_FEEDBACK_TEMPLATE, ResetTiming, reset_feedback_template};

/// Longest template we encode (identify) plus headroom.
pub const MAX_BLINK_STEPS: usize = 16;

/// Logical level applied to the output during a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlinkAction {
    On,
    Off,
}

impl BlinkAction {
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, BlinkAction::On)
    }
}

/// One timed step of a blink pattern.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlinkStep {
    pub action: BlinkAction,
    pub hold_for: Duration,
}

impl BlinkStep {
    pub const fn new(action: BlinkAction, hold_for: Duration) -> Self {
        Self { action, hold_for }
    }

    pub const fn on(hold_for: Duration) -> Self {
        Self::new(BlinkAction::On, hold_for)
    }

    pub const fn off(hold_for: Duration) -> Self {
        Self::new(BlinkAction::Off, hold_for)
    }
}

/// Which activity a template belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlinkPatternKind {
    Identify,
    ResetFeedback,
}

impl fmt::Display for BlinkPatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlinkPatternKind::Identify => f.write_str("identify"),
            BlinkPatternKind::ResetFeedback => f.write_str("reset-feedback"),
        }
    }
}

/// Immutable blink pattern bound to one output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlinkTemplate {
    pub kind: BlinkPatternKind,
    pub line: OutputId,
    pub steps: &'static [BlinkStep],
}

impl BlinkTemplate {
    pub const fn new(kind: BlinkPatternKind, line: OutputId, steps: &'static [BlinkStep]) -> Self {
        Self { kind, line, steps }
    }

    #[must_use]
    pub const fn steps(&self) -> &'static [BlinkStep] {
        self.steps
    }

    #[must_use]
    pub const fn step_count(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn output(&self) -> OutputLine {
        output_by_id(self.line)
    }

    /// Lease owner used while the template runs.
    #[must_use]
    pub const fn owner(&self) -> OutputOwner {
        match self.kind {
            BlinkPatternKind::Identify => OutputOwner::Identify,
            BlinkPatternKind::ResetFeedback => OutputOwner::ResetFeedback,
        }
    }

    /// Sum of every step's hold time.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.steps
            .iter()
            .fold(Duration::ZERO, |acc, step| acc + step.hold_for)
    }

    /// Number of off→on transitions in the pattern.
    #[must_use]
    pub fn flash_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.action.is_on())
            .count()
    }
}
