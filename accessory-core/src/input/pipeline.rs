//! Per-input glue: sample → debounce → classify, with telemetry.

use core::time::Duration;

use crate::clock::AccessoryInstant;
use crate::config::InputConfig;
use crate::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

use super::{
    Debouncer, Gesture, GestureClassifier, InputId, InputRole, Level, Polarity, RawSample,
    StableEdge, TransientSampleError,
};

/// Debouncer and classifier for one physical input.
#[derive(Clone, Debug)]
pub struct InputChannel<I> {
    id: InputId,
    role: InputRole,
    polarity: Polarity,
    config: InputConfig,
    debouncer: Debouncer<I>,
    classifier: GestureClassifier<I>,
}

impl<I> InputChannel<I>
where
    I: AccessoryInstant,
{
    /// Creates a channel that starts at the released/idle level.
    #[must_use]
    pub const fn new(id: InputId, role: InputRole, polarity: Polarity, config: InputConfig) -> Self {
        Self::with_initial(id, role, polarity, config, polarity.idle_level())
    }

    #[must_use]
    pub const fn with_initial(
        id: InputId,
        role: InputRole,
        polarity: Polarity,
        config: InputConfig,
        initial: Level,
    ) -> Self {
        Self {
            id,
            role,
            polarity,
            config,
            debouncer: Debouncer::with_threshold(initial, config.debounce, config.analog_threshold),
            classifier: GestureClassifier::new(role, polarity, initial, config.thresholds),
        }
    }

    #[must_use]
    pub const fn id(&self) -> InputId {
        self.id
    }

    #[must_use]
    pub const fn role(&self) -> InputRole {
        self.role
    }

    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    #[must_use]
    pub const fn config(&self) -> InputConfig {
        self.config
    }

    #[must_use]
    pub const fn sample_interval(&self) -> Duration {
        self.config.sample_interval
    }

    #[must_use]
    pub const fn stable_level(&self) -> Level {
        self.debouncer.stable_level()
    }

    /// Whether the debounced level is the asserted one (pressed, contact detected).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.polarity.is_active(self.debouncer.stable_level())
    }

    /// Swaps timing parameters. The stable level is kept; a press in
    /// progress is dropped.
    pub fn reconfigure(&mut self, config: InputConfig) {
        let level = self.stable_level();
        self.config = config;
        self.debouncer = Debouncer::with_threshold(level, config.debounce, config.analog_threshold);
        self.classifier = GestureClassifier::new(self.role, self.polarity, level, config.thresholds);
    }

    /// Forces both stages to `level`.
    pub fn resync(&mut self, level: Level) {
        self.debouncer.resync(level);
        self.classifier.resync(level);
    }

    /// Handles one sampling tick.
    ///
    /// A failed poll is recorded and skipped; the stable level is kept and no
    /// edge is produced. The max-hold ceiling is checked on every tick.
    pub fn process<const T: usize>(
        &mut self,
        sample: Result<RawSample<I>, TransientSampleError>,
        now: I,
        telemetry: &mut TelemetryRecorder<I, T>,
    ) -> Option<Gesture> {
        let gesture = match sample {
            Ok(sample) => self
                .debouncer
                .observe(sample)
                .and_then(|edge| self.on_edge(edge, telemetry)),
            Err(error) => {
                telemetry.record(
                    TelemetryEventKind::SampleDropped(error.input),
                    TelemetryPayload::None,
                    now,
                );
                None
            }
        };

        if self.classifier.expire(now) {
            telemetry.record(
                TelemetryEventKind::PressAbandoned(self.id),
                TelemetryPayload::None,
                now,
            );
        }
        gesture
    }

    fn on_edge<const T: usize>(
        &mut self,
        edge: StableEdge<I>,
        telemetry: &mut TelemetryRecorder<I, T>,
    ) -> Option<Gesture> {
        telemetry.record(
            TelemetryEventKind::EdgeDetected(self.id),
            TelemetryPayload::Edge {
                from: edge.from,
                to: edge.to,
            },
            edge.timestamp,
        );

        let started = self.classifier.press_started();
        let result = self.classifier.on_edge(edge, edge.timestamp);
        debug_assert!(result.is_ok(), "{}: {:?}", self.id, result);

        match result {
            Ok(Some(gesture)) => {
                let held = match gesture {
                    Gesture::ShortPress | Gesture::LongPress => {
                        started.map(|start| edge.timestamp.saturating_duration_since(start))
                    }
                    _ => None,
                };
                telemetry.record(
                    TelemetryEventKind::GestureClassified(self.id),
                    TelemetryPayload::Gesture { gesture, held },
                    edge.timestamp,
                );
                Some(gesture)
            }
            Ok(None) => None,
            Err(violation) => {
                telemetry.record(
                    TelemetryEventKind::InvariantViolation(self.id),
                    TelemetryPayload::Violation(violation),
                    edge.timestamp,
                );
                self.resync(edge.to);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MicrosInstant;
    use crate::config::PressThresholds;

    type Recorder = TelemetryRecorder<MicrosInstant>;

    fn at(ms: u64) -> MicrosInstant {
        MicrosInstant::from_millis(ms)
    }

    fn button(thresholds: PressThresholds) -> InputChannel<MicrosInstant> {
        let config = InputConfig {
            thresholds,
            ..InputConfig::button()
        };
        InputChannel::new(InputId::Button, InputRole::Button, Polarity::ActiveLow, config)
    }

    /// Feeds `level` every 5 ms over `[from, to)` and collects gestures.
    fn hold(
        channel: &mut InputChannel<MicrosInstant>,
        telemetry: &mut Recorder,
        level: Level,
        from: u64,
        to: u64,
    ) -> Option<Gesture> {
        let mut found = None;
        let mut ms = from;
        while ms < to {
            let sample = RawSample::digital(at(ms), level);
            if let Some(gesture) = channel.process(Ok(sample), at(ms), telemetry) {
                assert!(found.is_none(), "more than one gesture in a hold");
                found = Some(gesture);
            }
            ms += 5;
        }
        found
    }

    #[test]
    fn short_press_through_bounce() {
        let mut channel = button(PressThresholds::DEFAULT);
        let mut telemetry = Recorder::new();

        for (ms, level) in [(0, Level::Low), (5, Level::High), (10, Level::Low)] {
            let sample = RawSample::digital(at(ms), level);
            assert_eq!(channel.process(Ok(sample), at(ms), &mut telemetry), None);
        }
        assert_eq!(hold(&mut channel, &mut telemetry, Level::Low, 15, 160), None);
        assert!(channel.is_active());
        assert_eq!(
            hold(&mut channel, &mut telemetry, Level::High, 160, 220),
            Some(Gesture::ShortPress)
        );
        assert_eq!(
            telemetry.count_where(|event| *event == TelemetryEventKind::EdgeDetected(InputId::Button)),
            2
        );
        let Some(record) = telemetry.latest() else {
            panic!("gesture not recorded");
        };
        assert!(matches!(
            record.details,
            TelemetryPayload::Gesture {
                gesture: Gesture::ShortPress,
                held: Some(_),
            }
        ));
    }

    #[test]
    fn transient_errors_keep_stable_level() {
        let mut channel = button(PressThresholds::DEFAULT);
        let mut telemetry = Recorder::new();

        hold(&mut channel, &mut telemetry, Level::Low, 0, 50);
        let failed = Err(TransientSampleError {
            input: InputId::Button,
        });
        assert_eq!(channel.process(failed, at(50), &mut telemetry), None);
        assert_eq!(channel.stable_level(), Level::Low);
        assert_eq!(
            telemetry.count_where(|event| *event == TelemetryEventKind::SampleDropped(InputId::Button)),
            1
        );
    }

    #[test]
    fn dead_zone_release_is_silent() {
        let mut channel = button(PressThresholds::DEFAULT);
        let mut telemetry = Recorder::new();

        assert_eq!(hold(&mut channel, &mut telemetry, Level::Low, 0, 2_000), None);
        assert_eq!(hold(&mut channel, &mut telemetry, Level::High, 2_000, 2_100), None);
        assert_eq!(channel.stable_level(), Level::High);
    }

    #[test]
    fn press_past_ceiling_is_abandoned() {
        let mut channel = button(PressThresholds {
            short_press_max: Duration::from_millis(100),
            long_press_min: Duration::from_millis(200),
            max_hold: Some(Duration::from_millis(400)),
        });
        let mut telemetry = Recorder::new();

        assert_eq!(hold(&mut channel, &mut telemetry, Level::Low, 0, 600), None);
        assert_eq!(
            telemetry.count_where(|event| *event == TelemetryEventKind::PressAbandoned(InputId::Button)),
            1
        );
        assert_eq!(
            hold(&mut channel, &mut telemetry, Level::High, 600, 700),
            Some(Gesture::Released)
        );
    }

    #[test]
    fn contact_sensor_maps_levels() {
        let mut channel: InputChannel<MicrosInstant> = InputChannel::new(
            InputId::ContactSensor,
            InputRole::BinarySensor,
            Polarity::ActiveLow,
            InputConfig::contact_sensor(),
        );
        let mut telemetry = Recorder::new();

        let mut step = |ms: u64, reading: u16| {
            channel.process(Ok(RawSample::analog(at(ms), reading)), at(ms), &mut telemetry)
        };
        assert_eq!(step(0, 100), None);
        assert_eq!(step(250, 100), Some(Gesture::SensorActive));
        assert_eq!(step(500, 900), None);
        assert_eq!(step(750, 900), Some(Gesture::SensorInactive));
    }

    #[test]
    fn reconfigure_keeps_stable_level() {
        let mut channel = button(PressThresholds::DEFAULT);
        let mut telemetry = Recorder::new();
        hold(&mut channel, &mut telemetry, Level::Low, 0, 50);

        let mut config = channel.config();
        config.debounce = Duration::from_millis(40);
        channel.reconfigure(config);

        assert_eq!(channel.stable_level(), Level::Low);
        assert_eq!(channel.config().debounce, Duration::from_millis(40));
        // the press in progress was dropped, so this release classifies nothing
        assert_eq!(hold(&mut channel, &mut telemetry, Level::High, 50, 150), None);
    }
}
