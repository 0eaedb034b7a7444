//! Tick-driven activities that borrow the outputs: identify and factory reset.
//!
//! Neither activity blocks. Callers advance them with `tick(now)` from a
//! periodic task; each tick performs whatever steps are due and returns.

use core::fmt;

use crate::clock::AccessoryInstant;
use crate::outputs::{LeaseError, OutputBank, OutputLease, OutputSink};
use crate::sequences::BlinkTemplate;

pub mod identify;
pub mod reset;

pub use identify::IdentifySequencer;
pub use reset::{ResetHooks, ResetSequencer, ResetStage};

/// Activities that can run alongside normal operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivityKind {
    Identify,
    Reset,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Identify => f.write_str("identify"),
            ActivityKind::Reset => f.write_str("reset"),
        }
    }
}

/// Lifecycle of an activity instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivityState {
    Idle,
    Running,
    Completed,
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityState::Idle => f.write_str("idle"),
            ActivityState::Running => f.write_str("running"),
            ActivityState::Completed => f.write_str("completed"),
        }
    }
}

/// Result of a trigger request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerOutcome {
    Started,
    /// Already running; the request had no effect.
    Ignored,
    /// The output needed by the activity is held by another activity.
    Blocked(LeaseError),
}

impl TriggerOutcome {
    #[must_use]
    pub const fn started(self) -> bool {
        matches!(self, TriggerOutcome::Started)
    }
}

/// Progress reported by [`BlinkRunner::advance`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlinkProgress {
    Running,
    Finished,
}

/// Walks a blink template on a leased output.
#[derive(Copy, Clone, Debug)]
pub struct BlinkRunner<I> {
    template: BlinkTemplate,
    index: usize,
    step_deadline: I,
}

impl<I> BlinkRunner<I>
where
    I: AccessoryInstant,
{
    /// Applies the first step and arms its deadline.
    pub fn start<S: OutputSink>(
        template: BlinkTemplate,
        lease: &OutputLease,
        outputs: &mut OutputBank<S>,
        now: I,
    ) -> Self {
        let mut step_deadline = now;
        if let Some(step) = template.steps().first() {
            outputs.drive_leased(lease, step.action.is_on());
            step_deadline = now + step.hold_for;
        }
        Self {
            template,
            index: 0,
            step_deadline,
        }
    }

    /// Applies every step whose predecessor has expired by `now`.
    pub fn advance<S: OutputSink>(
        &mut self,
        lease: &OutputLease,
        outputs: &mut OutputBank<S>,
        now: I,
    ) -> BlinkProgress {
        while now >= self.step_deadline {
            self.index += 1;
            let Some(step) = self.template.steps().get(self.index) else {
                return BlinkProgress::Finished;
            };
            outputs.drive_leased(lease, step.action.is_on());
            self.step_deadline = self.step_deadline + step.hold_for;
        }
        BlinkProgress::Running
    }

    /// Index of the step currently shown.
    #[must_use]
    pub const fn step_index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn template(&self) -> BlinkTemplate {
        self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MicrosInstant;
    use crate::outputs::{NoopOutputSink, OutputId, OutputOwner};
    use crate::sequences::{BlinkPatternKind, BlinkStep};
    use core::time::Duration;

    const STEPS: [BlinkStep; 2] = [
        BlinkStep::on(Duration::from_millis(10)),
        BlinkStep::off(Duration::from_millis(10)),
    ];
    const TEMPLATE: BlinkTemplate =
        BlinkTemplate::new(BlinkPatternKind::Identify, OutputId::StatusLed, &STEPS);

    #[test]
    fn runner_finishes_after_last_step_expires() {
        let mut outputs = OutputBank::new(NoopOutputSink);
        let lease = outputs
            .acquire(OutputId::StatusLed, OutputOwner::Identify)
            .expect("led free");
        let start = MicrosInstant::ZERO;
        let mut runner = BlinkRunner::start(TEMPLATE, &lease, &mut outputs, start);

        let at = |ms| start + Duration::from_millis(ms);
        assert_eq!(runner.advance(&lease, &mut outputs, at(9)), BlinkProgress::Running);
        assert_eq!(runner.advance(&lease, &mut outputs, at(10)), BlinkProgress::Running);
        assert_eq!(runner.step_index(), 1);
        assert_eq!(runner.advance(&lease, &mut outputs, at(20)), BlinkProgress::Finished);
        outputs.release(lease);
    }

    #[test]
    fn late_tick_catches_up_in_one_call() {
        let mut outputs = OutputBank::new(NoopOutputSink);
        let lease = outputs
            .acquire(OutputId::StatusLed, OutputOwner::Identify)
            .expect("led free");
        let mut runner = BlinkRunner::start(TEMPLATE, &lease, &mut outputs, MicrosInstant::ZERO);
        assert_eq!(
            runner.advance(&lease, &mut outputs, MicrosInstant::from_millis(500)),
            BlinkProgress::Finished
        );
        outputs.release(lease);
    }
}
