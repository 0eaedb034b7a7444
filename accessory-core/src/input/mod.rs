//! Physical input model: raw samples, stable edges, gestures.
//!
//! Samples come from an [`InputSource`] polled at a fixed interval. The
//! [`debounce::Debouncer`] turns them into [`StableEdge`]s, and the
//! [`gesture::GestureClassifier`] turns edges into [`Gesture`]s. The
//! [`pipeline::InputChannel`] glues both together for one physical input.

use core::fmt;

pub mod debounce;
pub mod gesture;
pub mod pipeline;

pub use debounce::Debouncer;
pub use gesture::{GestureClassifier, InvariantViolation};
pub use pipeline::InputChannel;

/// Electrical level of a digital line (or side of the analog threshold).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[must_use]
    pub const fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("low"),
            Level::High => f.write_str("high"),
        }
    }
}

/// Which electrical level means "asserted" (pressed, contact detected, output on).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

impl Polarity {
    /// Level that represents the asserted state.
    #[must_use]
    pub const fn active_level(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::Low,
            Polarity::ActiveHigh => Level::High,
        }
    }

    /// Level that represents the released state.
    #[must_use]
    pub const fn idle_level(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::High,
            Polarity::ActiveHigh => Level::Low,
        }
    }

    #[must_use]
    pub const fn is_active(self, level: Level) -> bool {
        matches!(
            (self, level),
            (Polarity::ActiveLow, Level::Low) | (Polarity::ActiveHigh, Level::High)
        )
    }

    /// Electrical level to drive for a logical on/off value.
    #[must_use]
    pub const fn level_for(self, on: bool) -> Level {
        if on {
            self.active_level()
        } else {
            self.idle_level()
        }
    }
}

/// Physical inputs wired on the supported boards.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputId {
    Button,
    ContactSensor,
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputId::Button => f.write_str("button"),
            InputId::ContactSensor => f.write_str("contact-sensor"),
        }
    }
}

/// How edges on an input are interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputRole {
    /// Momentary push button classified by press duration.
    Button,
    /// Binary sensor where every stable level maps straight to a gesture.
    BinarySensor,
}

/// Value carried by a raw sample.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleValue {
    Digital(Level),
    /// ADC reading; compared against the configured threshold.
    Analog(u16),
}

impl SampleValue {
    /// Resolves the sample to a level. Analog readings strictly above
    /// `threshold` are high.
    #[must_use]
    pub const fn level(self, threshold: u16) -> Level {
        match self {
            SampleValue::Digital(level) => level,
            SampleValue::Analog(reading) => Level::from_bool(reading > threshold),
        }
    }
}

/// Timestamped physical reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RawSample<I> {
    pub timestamp: I,
    pub value: SampleValue,
}

impl<I> RawSample<I> {
    pub const fn digital(timestamp: I, level: Level) -> Self {
        Self {
            timestamp,
            value: SampleValue::Digital(level),
        }
    }

    pub const fn analog(timestamp: I, reading: u16) -> Self {
        Self {
            timestamp,
            value: SampleValue::Analog(reading),
        }
    }
}

/// Debounced transition between two stable levels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StableEdge<I> {
    pub from: Level,
    pub to: Level,
    pub timestamp: I,
}

/// Classified interaction with an input.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gesture {
    ShortPress,
    LongPress,
    /// Release of a press that exceeded the max-hold ceiling and was dropped unclassified.
    Released,
    SensorActive,
    SensorInactive,
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::ShortPress => f.write_str("short-press"),
            Gesture::LongPress => f.write_str("long-press"),
            Gesture::Released => f.write_str("released"),
            Gesture::SensorActive => f.write_str("sensor-active"),
            Gesture::SensorInactive => f.write_str("sensor-inactive"),
        }
    }
}

/// A single poll failed; the tick is skipped and the stable level retained.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransientSampleError {
    pub input: InputId,
}

impl fmt::Display for TransientSampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transient sample failure on {}", self.input)
    }
}

/// Source of raw samples for one physical input.
pub trait InputSource {
    type Instant;

    /// Identifier of the input this source reads.
    fn input(&self) -> InputId;

    /// Captures one sample. Must return within the sampling tick.
    fn poll(&mut self, now: Self::Instant) -> Result<RawSample<Self::Instant>, TransientSampleError>;
}
