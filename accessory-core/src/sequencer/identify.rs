//! Identify activity: blink the status LED so a user can find the device.

use crate::clock::AccessoryInstant;
use crate::outputs::{OutputBank, OutputLease, OutputSink};
use crate::sequences::{BlinkTemplate, IDENTIFY_TEMPLATE};
use crate::telemetry::{TelemetryEventKind, TelemetryRecorder};

use super::{ActivityKind, ActivityState, BlinkProgress, BlinkRunner, TriggerOutcome};

struct IdentifyRun<I> {
    lease: OutputLease,
    runner: BlinkRunner<I>,
    triggered_at: I,
}

/// Runs the identify pattern at most once at a time.
///
/// While running, the LED is leased; completion or cancellation releases it,
/// which restores whatever normal operation last asked for.
pub struct IdentifySequencer<I> {
    template: BlinkTemplate,
    state: ActivityState,
    run: Option<IdentifyRun<I>>,
    cancel_requested: bool,
}

impl<I> IdentifySequencer<I>
where
    I: AccessoryInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self::with_template(IDENTIFY_TEMPLATE)
    }

    #[must_use]
    pub const fn with_template(template: BlinkTemplate) -> Self {
        Self {
            template,
            state: ActivityState::Idle,
            run: None,
            cancel_requested: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ActivityState {
        self.state
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, ActivityState::Running)
    }

    #[must_use]
    pub const fn template(&self) -> BlinkTemplate {
        self.template
    }

    /// Starts the pattern unless it is already running.
    pub fn trigger<S: OutputSink, const T: usize>(
        &mut self,
        outputs: &mut OutputBank<S>,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) -> TriggerOutcome {
        let ignored = TelemetryEventKind::ActivityIgnored(ActivityKind::Identify);
        if self.is_running() {
            telemetry.record_activity(ignored, self.run.as_ref().map(|run| run.triggered_at), now);
            return TriggerOutcome::Ignored;
        }

        let lease = match outputs.acquire(self.template.line, self.template.owner()) {
            Ok(lease) => lease,
            Err(error) => {
                telemetry.record_activity(ignored, None, now);
                return TriggerOutcome::Blocked(error);
            }
        };

        let runner = BlinkRunner::start(self.template, &lease, outputs, now);
        self.run = Some(IdentifyRun {
            lease,
            runner,
            triggered_at: now,
        });
        self.state = ActivityState::Running;
        self.cancel_requested = false;
        telemetry.record_activity(
            TelemetryEventKind::ActivityStarted(ActivityKind::Identify),
            None,
            now,
        );
        TriggerOutcome::Started
    }

    /// Asks a running pattern to stop at the next step boundary.
    pub fn cancel(&mut self) {
        if self.is_running() {
            self.cancel_requested = true;
        }
    }

    /// Advances the pattern. A `Completed` sequencer returns to `Idle` on the following tick.
    pub fn tick<S: OutputSink, const T: usize>(
        &mut self,
        outputs: &mut OutputBank<S>,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) {
        match self.state {
            ActivityState::Idle => {}
            ActivityState::Completed => self.state = ActivityState::Idle,
            ActivityState::Running => {
                if self.cancel_requested {
                    self.finish(outputs, telemetry, now, true);
                    return;
                }
                let finished = self.run.as_mut().is_none_or(|run| {
                    run.runner.advance(&run.lease, outputs, now) == BlinkProgress::Finished
                });
                if finished {
                    self.finish(outputs, telemetry, now, false);
                }
            }
        }
    }

    fn finish<S: OutputSink, const T: usize>(
        &mut self,
        outputs: &mut OutputBank<S>,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
        cancelled: bool,
    ) {
        let triggered_at = self.run.take().map(|run| {
            outputs.release(run.lease);
            run.triggered_at
        });
        self.cancel_requested = false;
        let event = if cancelled {
            self.state = ActivityState::Idle;
            TelemetryEventKind::ActivityCancelled(ActivityKind::Identify)
        } else {
            self.state = ActivityState::Completed;
            TelemetryEventKind::ActivityCompleted(ActivityKind::Identify)
        };
        telemetry.record_activity(event, triggered_at, now);
    }
}

impl<I> Default for IdentifySequencer<I>
where
    I: AccessoryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MicrosInstant;
    use crate::input::Level;
    use crate::outputs::{OutputId, OutputOwner};
    use heapless::Vec;

    #[derive(Default)]
    struct LedLog {
        writes: Vec<Level, 64>,
    }

    impl OutputSink for LedLog {
        fn set_output(&mut self, pin: OutputId, level: Level) {
            if pin == OutputId::StatusLed {
                self.writes.push(level).expect("led log overflow");
            }
        }
    }

    fn at(ms: u64) -> MicrosInstant {
        MicrosInstant::from_millis(ms)
    }

    fn run_until_idle(
        identify: &mut IdentifySequencer<MicrosInstant>,
        outputs: &mut OutputBank<LedLog>,
        telemetry: &mut TelemetryRecorder<MicrosInstant>,
        from_ms: u64,
    ) -> u64 {
        let mut ms = from_ms;
        while identify.is_running() {
            ms += 10;
            identify.tick(outputs, telemetry, at(ms));
        }
        ms
    }

    #[test]
    fn pattern_flashes_six_times_then_restores_led() {
        let mut outputs = OutputBank::new(LedLog::default());
        let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
        let mut identify = IdentifySequencer::new();

        assert_eq!(
            identify.trigger(&mut outputs, &mut telemetry, at(0)),
            TriggerOutcome::Started
        );
        assert_eq!(
            outputs.holder(OutputId::StatusLed),
            Some(OutputOwner::Identify)
        );

        let done_at = run_until_idle(&mut identify, &mut outputs, &mut telemetry, 0);
        assert!(done_at >= 1_950);
        assert_eq!(identify.state(), ActivityState::Completed);
        assert_eq!(outputs.holder(OutputId::StatusLed), None);

        let writes = &outputs.sink().writes;
        let flashes = writes
            .windows(2)
            .filter(|pair| pair[0] == Level::High && pair[1] == Level::Low)
            .count()
            + usize::from(writes.first() == Some(&Level::Low));
        assert_eq!(flashes, 6);
        // LED is active-low: restored to logical off
        assert_eq!(writes.last(), Some(&Level::High));

        identify.tick(&mut outputs, &mut telemetry, at(done_at + 10));
        assert_eq!(identify.state(), ActivityState::Idle);
    }

    #[test]
    fn retrigger_while_running_is_ignored() {
        let mut outputs = OutputBank::new(LedLog::default());
        let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
        let mut identify = IdentifySequencer::new();

        identify.trigger(&mut outputs, &mut telemetry, at(0));
        identify.tick(&mut outputs, &mut telemetry, at(150));
        assert_eq!(
            identify.trigger(&mut outputs, &mut telemetry, at(160)),
            TriggerOutcome::Ignored
        );

        let done_at = run_until_idle(&mut identify, &mut outputs, &mut telemetry, 160);
        // the first run's schedule is untouched by the ignored trigger
        assert!(done_at < 1_950 + 20);
        assert_eq!(
            telemetry.count_where(|event| {
                *event == TelemetryEventKind::ActivityStarted(ActivityKind::Identify)
            }),
            1
        );
    }

    #[test]
    fn cancellation_releases_led_on_next_tick() {
        let mut outputs = OutputBank::new(LedLog::default());
        let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
        let mut identify = IdentifySequencer::new();

        identify.trigger(&mut outputs, &mut telemetry, at(0));
        identify.cancel();
        assert!(identify.is_running());
        identify.tick(&mut outputs, &mut telemetry, at(50));

        assert_eq!(identify.state(), ActivityState::Idle);
        assert_eq!(outputs.holder(OutputId::StatusLed), None);
        assert_eq!(outputs.sink().writes.last(), Some(&Level::High));
    }

    #[test]
    fn blocked_when_led_is_leased_elsewhere() {
        let mut outputs = OutputBank::new(LedLog::default());
        let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
        let mut identify = IdentifySequencer::new();
        let lease = outputs
            .acquire(OutputId::StatusLed, OutputOwner::ResetFeedback)
            .expect("led free");

        assert!(matches!(
            identify.trigger(&mut outputs, &mut telemetry, at(0)),
            TriggerOutcome::Blocked(_)
        ));
        assert_eq!(identify.state(), ActivityState::Idle);
        outputs.release(lease);
    }
}
