//! Typed characteristic values and their static descriptions.

use core::fmt;

use heapless::String;

use crate::outputs::OutputId;

/// Longest text value stored in a characteristic.
pub const MAX_TEXT_LEN: usize = 64;

pub type TextValue = String<MAX_TEXT_LEN>;

/// Characteristics exposed by the built-in accessory profiles.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharacteristicId {
    Name,
    /// Write-only trigger for the identify activity; never stored.
    Identify,
    On,
    Active,
    RotationSpeed,
    ContactSensorState,
}

impl CharacteristicId {
    pub const ALL: [CharacteristicId; 6] = [
        CharacteristicId::Name,
        CharacteristicId::Identify,
        CharacteristicId::On,
        CharacteristicId::Active,
        CharacteristicId::RotationSpeed,
        CharacteristicId::ContactSensorState,
    ];

    /// Console/log name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            CharacteristicId::Name => "name",
            CharacteristicId::Identify => "identify",
            CharacteristicId::On => "on",
            CharacteristicId::Active => "active",
            CharacteristicId::RotationSpeed => "speed",
            CharacteristicId::ContactSensorState => "contact",
        }
    }

    /// Case-insensitive lookup by console name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value domain of a characteristic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValueFormat {
    Bool,
    Int { min: i32, max: i32, step: i32 },
    Text,
}

/// Whether remote clients may write the characteristic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Owned characteristic value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    Int(i32),
    Text(TextValue),
}

impl CharacteristicValue {
    /// Builds a text value, truncating at a character boundary when too long.
    #[must_use]
    pub fn text(value: &str) -> Self {
        CharacteristicValue::Text(truncate_text(value))
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            CharacteristicValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            CharacteristicValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Logical on/off state used when the value drives an output.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            CharacteristicValue::Bool(value) => *value,
            CharacteristicValue::Int(value) => *value != 0,
            CharacteristicValue::Text(value) => !value.is_empty(),
        }
    }
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Bool(value) => write!(f, "{value}"),
            CharacteristicValue::Int(value) => write!(f, "{value}"),
            CharacteristicValue::Text(value) => write!(f, "\"{value}\""),
        }
    }
}

/// Default value as stored in `const` profile tables.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i32),
    Text(&'static str),
}

impl DefaultValue {
    #[must_use]
    pub fn to_value(self) -> CharacteristicValue {
        match self {
            DefaultValue::Bool(value) => CharacteristicValue::Bool(value),
            DefaultValue::Int(value) => CharacteristicValue::Int(value),
            DefaultValue::Text(value) => CharacteristicValue::text(value),
        }
    }
}

/// Static description of one characteristic in a profile.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CharacteristicSpec {
    pub id: CharacteristicId,
    pub format: ValueFormat,
    pub default: DefaultValue,
    pub access: Access,
    /// Output driven from the committed value, if the characteristic is an actuator.
    pub actuator: Option<OutputId>,
}

impl CharacteristicSpec {
    pub const fn new(
        id: CharacteristicId,
        format: ValueFormat,
        default: DefaultValue,
        access: Access,
    ) -> Self {
        Self {
            id,
            format,
            default,
            access,
            actuator: None,
        }
    }

    /// Marks the characteristic as driving `output`.
    #[must_use]
    pub const fn driving(mut self, output: OutputId) -> Self {
        self.actuator = Some(output);
        self
    }

    /// Checks that `value` fits the format (type, bounds, step).
    pub fn check(&self, value: &CharacteristicValue) -> Result<(), WriteError> {
        match (self.format, value) {
            (ValueFormat::Bool, CharacteristicValue::Bool(_))
            | (ValueFormat::Text, CharacteristicValue::Text(_)) => Ok(()),
            (ValueFormat::Int { min, max, step }, CharacteristicValue::Int(raw)) => {
                let raw = *raw;
                let in_range = (min..=max).contains(&raw);
                let off_step =
                    step > 1 && (i64::from(raw) - i64::from(min)) % i64::from(step) != 0;
                if !in_range || off_step {
                    Err(WriteError::OutOfRange { id: self.id, value: raw })
                } else {
                    Ok(())
                }
            }
            _ => Err(WriteError::TypeMismatch { id: self.id }),
        }
    }
}

/// Commit counter attached to every stored value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Next generation. 64 bits never run out at any realistic write rate.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Stored characteristic: description, committed value and its generation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Characteristic {
    spec: CharacteristicSpec,
    initial: CharacteristicValue,
    value: CharacteristicValue,
    generation: Generation,
}

impl Characteristic {
    #[must_use]
    pub fn new(spec: CharacteristicSpec) -> Self {
        Self::with_value(spec, spec.default.to_value())
    }

    /// Creates a characteristic whose factory value is `value` instead of the
    /// declared default (e.g. a name derived from the MAC address).
    #[must_use]
    pub fn with_value(spec: CharacteristicSpec, value: CharacteristicValue) -> Self {
        Self {
            spec,
            initial: value.clone(),
            value,
            generation: Generation::INITIAL,
        }
    }

    #[must_use]
    pub const fn id(&self) -> CharacteristicId {
        self.spec.id
    }

    #[must_use]
    pub const fn spec(&self) -> &CharacteristicSpec {
        &self.spec
    }

    #[must_use]
    pub const fn value(&self) -> &CharacteristicValue {
        &self.value
    }

    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Value restored by a factory reset.
    #[must_use]
    pub const fn factory_value(&self) -> &CharacteristicValue {
        &self.initial
    }

    pub(crate) fn commit(&mut self, value: CharacteristicValue, generation: Generation) {
        self.value = value;
        self.generation = generation;
    }
}

/// Rejected characteristic write. Nothing is mutated when one of these is returned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteError {
    UnknownCharacteristic { id: CharacteristicId },
    ReadOnly { id: CharacteristicId },
    TypeMismatch { id: CharacteristicId },
    OutOfRange { id: CharacteristicId, value: i32 },
}

impl WriteError {
    #[must_use]
    pub const fn id(&self) -> CharacteristicId {
        match self {
            WriteError::UnknownCharacteristic { id }
            | WriteError::ReadOnly { id }
            | WriteError::TypeMismatch { id }
            | WriteError::OutOfRange { id, .. } => *id,
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::UnknownCharacteristic { id } => write!(f, "{id} is not exposed"),
            WriteError::ReadOnly { id } => write!(f, "{id} is read-only"),
            WriteError::TypeMismatch { id } => write!(f, "wrong value type for {id}"),
            WriteError::OutOfRange { id, value } => write!(f, "{value} out of range for {id}"),
        }
    }
}

fn truncate_text(value: &str) -> TextValue {
    let mut text = TextValue::new();
    for ch in value.chars() {
        if text.push(ch).is_err() {
            break;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEED: CharacteristicSpec = CharacteristicSpec::new(
        CharacteristicId::RotationSpeed,
        ValueFormat::Int {
            min: 0,
            max: 3,
            step: 1,
        },
        DefaultValue::Int(1),
        Access::ReadWrite,
    );

    #[test]
    fn bounded_int_rejects_out_of_range() {
        assert_eq!(SPEED.check(&CharacteristicValue::Int(3)), Ok(()));
        assert_eq!(
            SPEED.check(&CharacteristicValue::Int(4)),
            Err(WriteError::OutOfRange {
                id: CharacteristicId::RotationSpeed,
                value: 4,
            })
        );
        assert_eq!(
            SPEED.check(&CharacteristicValue::Bool(true)),
            Err(WriteError::TypeMismatch {
                id: CharacteristicId::RotationSpeed,
            })
        );
    }

    #[test]
    fn step_is_enforced() {
        let spec = CharacteristicSpec::new(
            CharacteristicId::RotationSpeed,
            ValueFormat::Int {
                min: 0,
                max: 100,
                step: 25,
            },
            DefaultValue::Int(0),
            Access::ReadWrite,
        );
        assert_eq!(spec.check(&CharacteristicValue::Int(50)), Ok(()));
        assert!(spec.check(&CharacteristicValue::Int(30)).is_err());
    }

    #[test]
    fn offset_step_rejects_extreme_values() {
        let spec = CharacteristicSpec::new(
            CharacteristicId::RotationSpeed,
            ValueFormat::Int {
                min: 1,
                max: 100,
                step: 25,
            },
            DefaultValue::Int(1),
            Access::ReadWrite,
        );
        assert_eq!(spec.check(&CharacteristicValue::Int(76)), Ok(()));
        assert_eq!(
            spec.check(&CharacteristicValue::Int(i32::MIN)),
            Err(WriteError::OutOfRange {
                id: CharacteristicId::RotationSpeed,
                value: i32::MIN,
            })
        );
        assert!(spec.check(&CharacteristicValue::Int(i32::MAX)).is_err());
    }

    #[test]
    fn generations_keep_increasing_past_u32() {
        let late = Generation(u64::from(u32::MAX));
        assert!(late.next() > late);
        assert_eq!(late.next().value(), u64::from(u32::MAX) + 1);
    }

    #[test]
    fn long_text_is_truncated() {
        let long = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef-tail";
        assert!(long.len() > MAX_TEXT_LEN);
        match CharacteristicValue::text(long) {
            CharacteristicValue::Text(text) => assert_eq!(text.len(), MAX_TEXT_LEN),
            other => panic!("expected text value, got {other:?}"),
        }
    }

    #[test]
    fn names_round_trip_through_lookup() {
        assert_eq!(
            CharacteristicId::from_name("SPEED"),
            Some(CharacteristicId::RotationSpeed)
        );
        assert_eq!(CharacteristicId::from_name("volume"), None);
    }
}
