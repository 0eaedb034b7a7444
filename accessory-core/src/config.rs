//! Input timing configuration.
//!
//! Every threshold is configuration rather than a fixed constant. Presets are
//! `const` so firmware can build them in statics; the emulator overrides single
//! options with `key=value` assignments.

use core::fmt;
use core::time::Duration;

use crate::input::InputId;
use crate::input::debounce::DEFAULT_ANALOG_THRESHOLD;

pub const DEFAULT_BUTTON_SAMPLE_INTERVAL: Duration = Duration::from_millis(5);
pub const DEFAULT_SENSOR_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_BUTTON_DEBOUNCE: Duration = Duration::from_millis(20);
/// Two consecutive agreeing sensor reads.
pub const DEFAULT_SENSOR_DEBOUNCE: Duration = DEFAULT_SENSOR_SAMPLE_INTERVAL;
pub const DEFAULT_SHORT_PRESS_MAX: Duration = Duration::from_millis(500);
pub const DEFAULT_LONG_PRESS_MIN: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_HOLD: Duration = Duration::from_secs(60);

/// Option names accepted by [`InputConfig::set_option`].
pub const OPTION_NAMES: [&str; 6] = [
    "sample_interval_ms",
    "debounce_ms",
    "short_press_max_ms",
    "long_press_min_ms",
    "max_hold_ms",
    "analog_threshold",
];

/// Press duration thresholds used by the gesture classifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PressThresholds {
    /// Presses strictly shorter than this are short presses.
    pub short_press_max: Duration,
    /// Presses at least this long are long presses.
    pub long_press_min: Duration,
    /// Presses held longer than this are forgotten; `None` keeps them forever.
    pub max_hold: Option<Duration>,
}

impl PressThresholds {
    pub const DEFAULT: Self = Self {
        short_press_max: DEFAULT_SHORT_PRESS_MAX,
        long_press_min: DEFAULT_LONG_PRESS_MIN,
        max_hold: Some(DEFAULT_MAX_HOLD),
    };
}

impl Default for PressThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Sampling and classification settings for one physical input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InputConfig {
    pub sample_interval: Duration,
    pub debounce: Duration,
    pub thresholds: PressThresholds,
    pub analog_threshold: u16,
}

impl InputConfig {
    /// Momentary push button: tight polling, 20 ms debounce.
    #[must_use]
    pub const fn button() -> Self {
        Self {
            sample_interval: DEFAULT_BUTTON_SAMPLE_INTERVAL,
            debounce: DEFAULT_BUTTON_DEBOUNCE,
            thresholds: PressThresholds::DEFAULT,
            analog_threshold: DEFAULT_ANALOG_THRESHOLD,
        }
    }

    /// Slow analog contact sensor polled every 250 ms.
    #[must_use]
    pub const fn contact_sensor() -> Self {
        Self {
            sample_interval: DEFAULT_SENSOR_SAMPLE_INTERVAL,
            debounce: DEFAULT_SENSOR_DEBOUNCE,
            thresholds: PressThresholds::DEFAULT,
            analog_threshold: DEFAULT_ANALOG_THRESHOLD,
        }
    }

    /// Checks the cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }
        let thresholds = self.thresholds;
        if thresholds.short_press_max > thresholds.long_press_min {
            return Err(ConfigError::InvertedPressThresholds {
                short_press_max: thresholds.short_press_max,
                long_press_min: thresholds.long_press_min,
            });
        }
        if let Some(ceiling) = thresholds.max_hold
            && ceiling < thresholds.long_press_min
        {
            return Err(ConfigError::MaxHoldBelowLongPress { max_hold: ceiling });
        }
        Ok(())
    }

    /// Sets a single option by name. Millisecond options take whole milliseconds;
    /// `max_hold_ms=0` disables the ceiling.
    pub fn set_option(&mut self, name: &str, value: u32) -> Result<(), ConfigError> {
        let millis = Duration::from_millis(u64::from(value));
        match name {
            "sample_interval_ms" => self.sample_interval = millis,
            "debounce_ms" => self.debounce = millis,
            "short_press_max_ms" => self.thresholds.short_press_max = millis,
            "long_press_min_ms" => self.thresholds.long_press_min = millis,
            "max_hold_ms" => {
                self.thresholds.max_hold = if value == 0 { None } else { Some(millis) };
            }
            "analog_threshold" => {
                self.analog_threshold =
                    u16::try_from(value).map_err(|_| ConfigError::OutOfRange { value })?;
            }
            _ => return Err(ConfigError::UnknownOption),
        }
        Ok(())
    }

    /// Applies a `name=value` assignment and re-validates the result.
    ///
    /// The configuration is left untouched when the assignment is rejected.
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<(), ConfigError> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or(ConfigError::MalformedAssignment)?;
        let value = value
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::MalformedAssignment)?;

        let mut candidate = *self;
        candidate.set_option(name.trim(), value)?;
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self::button()
    }
}

/// Rejected configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    UnknownOption,
    /// The profile has no input with this id.
    UnknownInput(InputId),
    /// The profile has no physical inputs to configure.
    NoInputs,
    MalformedAssignment,
    OutOfRange { value: u32 },
    ZeroSampleInterval,
    InvertedPressThresholds {
        short_press_max: Duration,
        long_press_min: Duration,
    },
    MaxHoldBelowLongPress { max_hold: Duration },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownOption => f.write_str("unknown option"),
            ConfigError::UnknownInput(input) => write!(f, "profile has no {input} input"),
            ConfigError::NoInputs => f.write_str("profile has no inputs"),
            ConfigError::MalformedAssignment => f.write_str("expected <option>=<integer>"),
            ConfigError::OutOfRange { value } => write!(f, "value {value} out of range"),
            ConfigError::ZeroSampleInterval => f.write_str("sample interval must be non-zero"),
            ConfigError::InvertedPressThresholds {
                short_press_max,
                long_press_min,
            } => write!(
                f,
                "short press max {}ms exceeds long press min {}ms",
                short_press_max.as_millis(),
                long_press_min.as_millis()
            ),
            ConfigError::MaxHoldBelowLongPress { max_hold } => write!(
                f,
                "max hold {}ms is shorter than the long press threshold",
                max_hold.as_millis()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        assert_eq!(InputConfig::button().validate(), Ok(()));
        assert_eq!(InputConfig::contact_sensor().validate(), Ok(()));
    }

    #[test]
    fn assignment_updates_named_option() {
        let mut config = InputConfig::button();
        config
            .apply_assignment("debounce_ms=35")
            .expect("assignment accepted");
        assert_eq!(config.debounce, Duration::from_millis(35));

        config
            .apply_assignment("max_hold_ms=0")
            .expect("ceiling can be disabled");
        assert_eq!(config.thresholds.max_hold, None);
    }

    #[test]
    fn rejected_assignment_leaves_config_untouched() {
        let mut config = InputConfig::button();
        let before = config;
        assert_eq!(
            config.apply_assignment("short_press_max_ms=20000"),
            Err(ConfigError::InvertedPressThresholds {
                short_press_max: Duration::from_secs(20),
                long_press_min: DEFAULT_LONG_PRESS_MIN,
            })
        );
        assert_eq!(config.apply_assignment("bogus=1"), Err(ConfigError::UnknownOption));
        assert_eq!(
            config.apply_assignment("debounce_ms"),
            Err(ConfigError::MalformedAssignment)
        );
        assert_eq!(config, before);
    }

    #[test]
    fn zero_sample_interval_is_rejected() {
        let mut config = InputConfig::contact_sensor();
        assert_eq!(
            config.apply_assignment("sample_interval_ms=0"),
            Err(ConfigError::ZeroSampleInterval)
        );
    }
}
