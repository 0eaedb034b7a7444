//! Gesture classification from debounced edges.

use core::fmt;
use core::time::Duration;

use crate::clock::AccessoryInstant;
use crate::config::PressThresholds;

use super::{Gesture, InputRole, Level, Polarity, StableEdge};

/// Edge stream broke the `from(n + 1) == to(n)` chain.
///
/// Only reachable when the caller bypasses or reorders the debouncer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InvariantViolation {
    EdgeDiscontinuity { expected: Level, found: Level },
    DegenerateEdge { level: Level },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::EdgeDiscontinuity { expected, found } => {
                write!(f, "edge starts at {found} but last stable level was {expected}")
            }
            InvariantViolation::DegenerateEdge { level } => {
                write!(f, "edge does not change level ({level})")
            }
        }
    }
}

/// Turns stable edges into gestures for a single input.
#[derive(Clone, Debug)]
pub struct GestureClassifier<I> {
    role: InputRole,
    polarity: Polarity,
    thresholds: PressThresholds,
    last_level: Level,
    press_started: Option<I>,
    abandoned: bool,
}

impl<I> GestureClassifier<I>
where
    I: AccessoryInstant,
{
    #[must_use]
    pub const fn new(
        role: InputRole,
        polarity: Polarity,
        initial: Level,
        thresholds: PressThresholds,
    ) -> Self {
        Self {
            role,
            polarity,
            thresholds,
            last_level: initial,
            press_started: None,
            abandoned: false,
        }
    }

    #[must_use]
    pub const fn role(&self) -> InputRole {
        self.role
    }

    #[must_use]
    pub const fn thresholds(&self) -> PressThresholds {
        self.thresholds
    }

    /// Start of the press currently being held, if any.
    #[must_use]
    pub const fn press_started(&self) -> Option<I> {
        self.press_started
    }

    /// Consumes one edge.
    ///
    /// On an invariant violation the classifier adopts the edge's target level
    /// and drops any half-seen press before returning the error.
    pub fn on_edge(
        &mut self,
        edge: StableEdge<I>,
        now: I,
    ) -> Result<Option<Gesture>, InvariantViolation> {
        if edge.from == edge.to {
            return Err(InvariantViolation::DegenerateEdge { level: edge.to });
        }
        if edge.from != self.last_level {
            let expected = self.last_level;
            self.resync(edge.to);
            return Err(InvariantViolation::EdgeDiscontinuity {
                expected,
                found: edge.from,
            });
        }
        self.last_level = edge.to;

        let active = self.polarity.is_active(edge.to);
        let gesture = match self.role {
            InputRole::BinarySensor => Some(if active {
                Gesture::SensorActive
            } else {
                Gesture::SensorInactive
            }),
            InputRole::Button if active => {
                self.press_started = Some(now);
                self.abandoned = false;
                None
            }
            InputRole::Button => self.on_release(now),
        };
        Ok(gesture)
    }

    /// Forgets a press held past the max-hold ceiling. Returns `true` when a press was dropped.
    pub fn expire(&mut self, now: I) -> bool {
        let (Some(started), Some(ceiling)) = (self.press_started, self.thresholds.max_hold) else {
            return false;
        };
        if now.saturating_duration_since(started) <= ceiling {
            return false;
        }
        self.press_started = None;
        self.abandoned = true;
        true
    }

    /// Adopts `level` as the current stable level and clears press tracking.
    pub fn resync(&mut self, level: Level) {
        self.last_level = level;
        self.press_started = None;
        self.abandoned = false;
    }

    fn on_release(&mut self, now: I) -> Option<Gesture> {
        let Some(started) = self.press_started.take() else {
            return if core::mem::take(&mut self.abandoned) {
                Some(Gesture::Released)
            } else {
                None
            };
        };

        let held = now.saturating_duration_since(started);
        if self
            .thresholds
            .max_hold
            .is_some_and(|ceiling| held > ceiling)
        {
            return Some(Gesture::Released);
        }
        self.thresholds.classify(held)
    }
}

impl PressThresholds {
    /// Maps a completed press duration to a gesture; the dead zone yields `None`.
    #[must_use]
    pub fn classify(&self, held: Duration) -> Option<Gesture> {
        if held < self.short_press_max {
            Some(Gesture::ShortPress)
        } else if held >= self.long_press_min {
            Some(Gesture::LongPress)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MicrosInstant;

    fn at(ms: u64) -> MicrosInstant {
        MicrosInstant::from_millis(ms)
    }

    fn thresholds() -> PressThresholds {
        PressThresholds {
            short_press_max: Duration::from_millis(300),
            long_press_min: Duration::from_millis(1_000),
            max_hold: None,
        }
    }

    fn button() -> GestureClassifier<MicrosInstant> {
        GestureClassifier::new(
            InputRole::Button,
            Polarity::ActiveLow,
            Level::High,
            thresholds(),
        )
    }

    fn press(ms: u64) -> StableEdge<MicrosInstant> {
        StableEdge {
            from: Level::High,
            to: Level::Low,
            timestamp: at(ms),
        }
    }

    fn release(ms: u64) -> StableEdge<MicrosInstant> {
        StableEdge {
            from: Level::Low,
            to: Level::High,
            timestamp: at(ms),
        }
    }

    fn run_press(classifier: &mut GestureClassifier<MicrosInstant>, held_ms: u64) -> Option<Gesture> {
        assert_eq!(classifier.on_edge(press(0), at(0)), Ok(None));
        classifier
            .on_edge(release(held_ms), at(held_ms))
            .expect("release should classify")
    }

    #[test]
    fn short_press_under_short_max() {
        assert_eq!(run_press(&mut button(), 150), Some(Gesture::ShortPress));
    }

    #[test]
    fn long_press_at_or_after_long_min() {
        assert_eq!(run_press(&mut button(), 1_200), Some(Gesture::LongPress));
        assert_eq!(run_press(&mut button(), 1_000), Some(Gesture::LongPress));
    }

    #[test]
    fn dead_zone_emits_nothing() {
        assert_eq!(run_press(&mut button(), 300), None);
        assert_eq!(run_press(&mut button(), 999), None);
    }

    #[test]
    fn binary_sensor_maps_every_edge() {
        let mut sensor = GestureClassifier::new(
            InputRole::BinarySensor,
            Polarity::ActiveLow,
            Level::High,
            thresholds(),
        );
        assert_eq!(sensor.on_edge(press(0), at(0)), Ok(Some(Gesture::SensorActive)));
        assert_eq!(
            sensor.on_edge(release(5), at(5)),
            Ok(Some(Gesture::SensorInactive))
        );
    }

    #[test]
    fn discontinuous_edge_is_an_invariant_violation() {
        let mut classifier = button();
        let error = classifier
            .on_edge(release(10), at(10))
            .expect_err("release without press must be rejected");
        assert_eq!(
            error,
            InvariantViolation::EdgeDiscontinuity {
                expected: Level::High,
                found: Level::Low,
            }
        );
        // resynchronised to the edge target; the next press is accepted
        assert_eq!(classifier.on_edge(press(20), at(20)), Ok(None));
    }

    #[test]
    fn max_hold_ceiling_abandons_press() {
        let mut classifier = GestureClassifier::new(
            InputRole::Button,
            Polarity::ActiveLow,
            Level::High,
            PressThresholds {
                max_hold: Some(Duration::from_secs(30)),
                ..thresholds()
            },
        );
        classifier.on_edge(press(0), at(0)).expect("press");
        assert!(!classifier.expire(at(29_000)));
        assert!(classifier.expire(at(31_000)));
        assert!(classifier.press_started().is_none());
        assert_eq!(
            classifier.on_edge(release(40_000), at(40_000)),
            Ok(Some(Gesture::Released))
        );
    }
}
