//! Time-based debounce and edge detection.

use core::time::Duration;

use crate::clock::AccessoryInstant;

use super::{Level, RawSample, StableEdge};

/// Midpoint of a 10-bit ADC range.
pub const DEFAULT_ANALOG_THRESHOLD: u16 = 512;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Candidate<I> {
    level: Level,
    since: I,
}

/// Converts a bouncing sample stream into stable level changes.
///
/// A level different from the stable one becomes a candidate; it is promoted
/// once it has been observed continuously for at least the debounce window.
/// Any sample back at the stable level discards the candidate.
#[derive(Clone, Debug)]
pub struct Debouncer<I> {
    window: Duration,
    threshold: u16,
    stable: Level,
    candidate: Option<Candidate<I>>,
}

impl<I> Debouncer<I>
where
    I: AccessoryInstant,
{
    /// Creates a debouncer that assumes `initial` is the current stable level.
    #[must_use]
    pub const fn new(initial: Level, window: Duration) -> Self {
        Self::with_threshold(initial, window, DEFAULT_ANALOG_THRESHOLD)
    }

    #[must_use]
    pub const fn with_threshold(initial: Level, window: Duration, threshold: u16) -> Self {
        Self {
            window,
            threshold,
            stable: initial,
            candidate: None,
        }
    }

    /// Last level that survived the debounce window.
    #[must_use]
    pub const fn stable_level(&self) -> Level {
        self.stable
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Feeds one sample and returns the edge it completes, if any.
    pub fn observe(&mut self, sample: RawSample<I>) -> Option<StableEdge<I>> {
        let level = sample.value.level(self.threshold);
        if level == self.stable {
            self.candidate = None;
            return None;
        }

        let since = match self.candidate {
            Some(candidate) if candidate.level == level => candidate.since,
            _ => {
                self.candidate = Some(Candidate {
                    level,
                    since: sample.timestamp,
                });
                sample.timestamp
            }
        };

        if sample.timestamp.saturating_duration_since(since) < self.window {
            return None;
        }

        let edge = StableEdge {
            from: self.stable,
            to: level,
            timestamp: sample.timestamp,
        };
        self.stable = level;
        self.candidate = None;
        Some(edge)
    }

    /// Forces the stable level, dropping any pending candidate.
    pub fn resync(&mut self, level: Level) {
        self.stable = level;
        self.candidate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MicrosInstant;

    fn at(ms: u64) -> MicrosInstant {
        MicrosInstant::from_millis(ms)
    }

    fn feed(
        debouncer: &mut Debouncer<MicrosInstant>,
        samples: &[(u64, Level)],
    ) -> heapless::Vec<StableEdge<MicrosInstant>, 8> {
        let mut edges = heapless::Vec::new();
        for &(ms, level) in samples {
            if let Some(edge) = debouncer.observe(RawSample::digital(at(ms), level)) {
                edges.push(edge).expect("edge buffer overflow");
            }
        }
        edges
    }

    #[test]
    fn bounce_then_settle_emits_single_edge() {
        let mut debouncer = Debouncer::new(Level::Low, Duration::from_millis(20));
        let edges = feed(
            &mut debouncer,
            &[
                (0, Level::High),
                (5, Level::Low),
                (10, Level::High),
                (30, Level::High),
                (50, Level::High),
            ],
        );

        assert_eq!(edges.len(), 1);
        let edge = edges[0];
        assert_eq!(edge.from, Level::Low);
        assert_eq!(edge.to, Level::High);
        assert!(edge.timestamp >= at(30));
        assert_eq!(debouncer.stable_level(), Level::High);
    }

    #[test]
    fn glitch_shorter_than_window_is_rejected() {
        let mut debouncer = Debouncer::new(Level::High, Duration::from_millis(20));
        let edges = feed(
            &mut debouncer,
            &[
                (0, Level::Low),
                (10, Level::Low),
                (19, Level::Low),
                (20, Level::High),
                (45, Level::High),
            ],
        );
        assert!(edges.is_empty());
        assert_eq!(debouncer.stable_level(), Level::High);
    }

    #[test]
    fn zero_window_promotes_immediately() {
        let mut debouncer = Debouncer::new(Level::Low, Duration::ZERO);
        let edge = debouncer
            .observe(RawSample::digital(at(3), Level::High))
            .expect("edge expected");
        assert_eq!(edge.timestamp, at(3));
    }

    #[test]
    fn consecutive_edges_chain_levels() {
        let mut debouncer = Debouncer::new(Level::High, Duration::from_millis(10));
        let edges = feed(
            &mut debouncer,
            &[
                (0, Level::Low),
                (10, Level::Low),
                (20, Level::High),
                (30, Level::High),
                (40, Level::Low),
                (55, Level::Low),
            ],
        );
        assert_eq!(edges.len(), 3);
        for pair in edges.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[test]
    fn analog_samples_use_threshold_side() {
        let mut debouncer = Debouncer::new(Level::High, Duration::from_millis(250));
        assert!(debouncer.observe(RawSample::analog(at(0), 100)).is_none());
        let edge = debouncer
            .observe(RawSample::analog(at(250), 400))
            .expect("contact edge");
        assert_eq!(edge.to, Level::Low);
        assert!(debouncer.observe(RawSample::analog(at(500), 300)).is_none());
    }
}
