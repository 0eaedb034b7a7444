use accessory_core::clock::MicrosInstant;
use accessory_core::input::Level;
use accessory_core::outputs::{OutputBank, OutputId, OutputOwner, OutputSink};
use accessory_core::sequencer::{ActivityState, IdentifySequencer, TriggerOutcome};
use accessory_core::sequences::IDENTIFY_TEMPLATE;
use accessory_core::telemetry::TelemetryRecorder;

#[derive(Default)]
struct LedLog {
    writes: Vec<Level>,
}

impl LedLog {
    /// Off→on transitions of the active-low LED.
    fn flashes(&self) -> usize {
        self.writes
            .windows(2)
            .filter(|pair| pair[0] == Level::High && pair[1] == Level::Low)
            .count()
            + usize::from(self.writes.first() == Some(&Level::Low))
    }
}

impl OutputSink for LedLog {
    fn set_output(&mut self, pin: OutputId, level: Level) {
        if pin == OutputId::StatusLed {
            self.writes.push(level);
        }
    }
}

fn at(ms: u64) -> MicrosInstant {
    MicrosInstant::from_millis(ms)
}

/// Ticks every 10 ms until the sequencer is idle again, re-triggering at `retrigger_at`.
fn run(
    identify: &mut IdentifySequencer<MicrosInstant>,
    outputs: &mut OutputBank<LedLog>,
    retrigger_at: &[u64],
) -> (u64, Vec<TriggerOutcome>) {
    let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
    let mut outcomes = vec![identify.trigger(outputs, &mut telemetry, at(0))];
    let mut ms = 0;
    while identify.state() != ActivityState::Idle {
        ms += 10;
        assert!(ms < 5_000, "identify never finished");
        if retrigger_at.contains(&ms) {
            outcomes.push(identify.trigger(outputs, &mut telemetry, at(ms)));
        }
        identify.tick(outputs, &mut telemetry, at(ms));
    }
    (ms, outcomes)
}

#[test]
fn pattern_flashes_six_times_and_restores_off() {
    let mut outputs = OutputBank::new(LedLog::default());
    let mut identify = IdentifySequencer::new();

    let (finished_at, outcomes) = run(&mut identify, &mut outputs, &[]);

    assert_eq!(outcomes, vec![TriggerOutcome::Started]);
    assert_eq!(outputs.sink().flashes(), 6);
    assert_eq!(outputs.sink().writes.last(), Some(&Level::High));
    assert_eq!(outputs.holder(OutputId::StatusLed), None);
    let total = u64::try_from(IDENTIFY_TEMPLATE.total_duration().as_millis()).unwrap_or(u64::MAX);
    assert!(finished_at >= total);
}

#[test]
fn retrigger_while_running_adds_no_cycles() {
    let mut outputs = OutputBank::new(LedLog::default());
    let mut identify = IdentifySequencer::new();

    let (_, outcomes) = run(&mut identify, &mut outputs, &[50, 400, 1_000]);

    assert_eq!(
        outcomes,
        vec![
            TriggerOutcome::Started,
            TriggerOutcome::Ignored,
            TriggerOutcome::Ignored,
            TriggerOutcome::Ignored,
        ]
    );
    assert_eq!(outputs.sink().flashes(), 6);
}

#[test]
fn led_returns_to_pre_identify_value() {
    let mut outputs = OutputBank::new(LedLog::default());
    outputs.drive(OutputId::StatusLed, true);
    let mut identify = IdentifySequencer::new();

    let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
    assert_eq!(identify.trigger(&mut outputs, &mut telemetry, at(0)), TriggerOutcome::Started);
    assert_eq!(outputs.holder(OutputId::StatusLed), Some(OutputOwner::Identify));
    let mut ms = 0;
    while identify.state() != ActivityState::Idle {
        ms += 10;
        identify.tick(&mut outputs, &mut telemetry, at(ms));
    }

    assert_eq!(outputs.sink().writes.last(), Some(&Level::Low));
}

#[test]
fn cancellation_releases_the_led() {
    let mut outputs = OutputBank::new(LedLog::default());
    let mut identify = IdentifySequencer::new();
    let mut telemetry: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();

    identify.trigger(&mut outputs, &mut telemetry, at(0));
    identify.tick(&mut outputs, &mut telemetry, at(150));
    identify.cancel();
    identify.tick(&mut outputs, &mut telemetry, at(160));

    assert!(!identify.is_running());
    assert_eq!(outputs.holder(OutputId::StatusLed), None);
    assert_eq!(outputs.sink().writes.last(), Some(&Level::High));
}
