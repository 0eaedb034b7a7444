//! Built-in accessory profiles.
//!
//! A profile is a `const` table: information service, characteristics,
//! physical inputs and the action each gesture maps to.

use core::fmt::{self, Write as _};

use crate::characteristic::{
    Access, CharacteristicId, CharacteristicSpec, DefaultValue, MAX_TEXT_LEN, TextValue,
    ValueFormat,
};
use crate::config::InputConfig;
use crate::input::{Gesture, InputId, InputRole, Polarity};
use crate::outputs::OutputId;

/// Pairing code handed to the accessory-protocol collaborator.
pub const DEFAULT_SETUP_CODE: &str = "111-11-111";
pub const FIRMWARE_REVISION: &str = "0.1";

/// `-XXYYZZ`
const NAME_SUFFIX_LEN: usize = 7;

/// Accessory category advertised to controllers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessoryCategory {
    Switch,
    Sensor,
    Fan,
}

impl fmt::Display for AccessoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessoryCategory::Switch => f.write_str("switch"),
            AccessoryCategory::Sensor => f.write_str("sensor"),
            AccessoryCategory::Fan => f.write_str("fan"),
        }
    }
}

/// Accessory information service.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessoryInfo {
    /// Prefix of the advertised name; the MAC suffix is appended at start-up.
    pub name_base: &'static str,
    pub manufacturer: &'static str,
    pub serial_number: &'static str,
    pub model: &'static str,
    pub firmware_revision: &'static str,
    pub category: AccessoryCategory,
    pub setup_code: &'static str,
}

/// What a classified gesture does.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GestureAction {
    /// Flip a boolean characteristic.
    Toggle(CharacteristicId),
    /// Write a fixed value.
    Set(CharacteristicId, DefaultValue),
    FactoryReset,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GestureRoute {
    pub gesture: Gesture,
    pub action: GestureAction,
}

/// One physical input and how its gestures are routed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InputBinding {
    pub input: InputId,
    pub role: InputRole,
    pub polarity: Polarity,
    pub config: InputConfig,
    pub routes: &'static [GestureRoute],
}

impl InputBinding {
    /// Action routed for `gesture`, if any.
    #[must_use]
    pub fn action_for(&self, gesture: Gesture) -> Option<GestureAction> {
        self.routes
            .iter()
            .find(|route| route.gesture == gesture)
            .map(|route| route.action)
    }
}

/// Selects one of the built-in profiles.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileKind {
    Switch,
    ContactSensor,
    Fan,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 3] = [
        ProfileKind::Switch,
        ProfileKind::ContactSensor,
        ProfileKind::Fan,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProfileKind::Switch => "switch",
            ProfileKind::ContactSensor => "contact",
            ProfileKind::Fan => "fan",
        }
    }

    /// Case-insensitive lookup; `contact-sensor` is accepted as an alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("contact-sensor") {
            return Some(ProfileKind::ContactSensor);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn profile(self) -> &'static AccessoryProfile {
        match self {
            ProfileKind::Switch => &SWITCH,
            ProfileKind::ContactSensor => &CONTACT_SENSOR,
            ProfileKind::Fan => &FAN,
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete description of one accessory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccessoryProfile {
    pub kind: ProfileKind,
    pub info: AccessoryInfo,
    pub characteristics: &'static [CharacteristicSpec],
    pub inputs: &'static [InputBinding],
}

impl AccessoryProfile {
    #[must_use]
    pub fn binding(&self, input: InputId) -> Option<&InputBinding> {
        self.inputs.iter().find(|binding| binding.input == input)
    }

    #[must_use]
    pub fn characteristic(&self, id: CharacteristicId) -> Option<&CharacteristicSpec> {
        self.characteristics.iter().find(|spec| spec.id == id)
    }
}

/// Read-only `Name` characteristic registered for every profile.
pub const NAME_SPEC: CharacteristicSpec = CharacteristicSpec::new(
    CharacteristicId::Name,
    ValueFormat::Text,
    DefaultValue::Text(""),
    Access::ReadOnly,
);

const BINARY: ValueFormat = ValueFormat::Int {
    min: 0,
    max: 1,
    step: 1,
};

const SWITCH_CHARACTERISTICS: [CharacteristicSpec; 1] = [CharacteristicSpec::new(
    CharacteristicId::On,
    ValueFormat::Bool,
    DefaultValue::Bool(false),
    Access::ReadWrite,
)
.driving(OutputId::Relay)];

const SWITCH_BUTTON_ROUTES: [GestureRoute; 2] = [
    GestureRoute {
        gesture: Gesture::ShortPress,
        action: GestureAction::Toggle(CharacteristicId::On),
    },
    GestureRoute {
        gesture: Gesture::LongPress,
        action: GestureAction::FactoryReset,
    },
];

const SWITCH_INPUTS: [InputBinding; 1] = [InputBinding {
    input: InputId::Button,
    role: InputRole::Button,
    polarity: Polarity::ActiveLow,
    config: InputConfig::button(),
    routes: &SWITCH_BUTTON_ROUTES,
}];

/// Relay switch with a touch button: short press toggles, long press resets.
pub const SWITCH: AccessoryProfile = AccessoryProfile {
    kind: ProfileKind::Switch,
    info: AccessoryInfo {
        name_base: "Sonoff Touch",
        manufacturer: "iTEAD",
        serial_number: "027E2BAGF19D",
        model: "Touch",
        firmware_revision: FIRMWARE_REVISION,
        category: AccessoryCategory::Switch,
        setup_code: DEFAULT_SETUP_CODE,
    },
    characteristics: &SWITCH_CHARACTERISTICS,
    inputs: &SWITCH_INPUTS,
};

const CONTACT_CHARACTERISTICS: [CharacteristicSpec; 1] = [CharacteristicSpec::new(
    CharacteristicId::ContactSensorState,
    BINARY,
    DefaultValue::Int(0),
    Access::ReadOnly,
)];

// Readings at or below the threshold report 1, above it 0.
const CONTACT_ROUTES: [GestureRoute; 2] = [
    GestureRoute {
        gesture: Gesture::SensorActive,
        action: GestureAction::Set(CharacteristicId::ContactSensorState, DefaultValue::Int(1)),
    },
    GestureRoute {
        gesture: Gesture::SensorInactive,
        action: GestureAction::Set(CharacteristicId::ContactSensorState, DefaultValue::Int(0)),
    },
];

const CONTACT_INPUTS: [InputBinding; 1] = [InputBinding {
    input: InputId::ContactSensor,
    role: InputRole::BinarySensor,
    polarity: Polarity::ActiveLow,
    config: InputConfig::contact_sensor(),
    routes: &CONTACT_ROUTES,
}];

/// Analog contact sensor polled every 250 ms.
pub const CONTACT_SENSOR: AccessoryProfile = AccessoryProfile {
    kind: ProfileKind::ContactSensor,
    info: AccessoryInfo {
        name_base: "Contact Sensor",
        manufacturer: "renssies",
        serial_number: "0N7F5BAGF16D",
        model: "CS1",
        firmware_revision: FIRMWARE_REVISION,
        category: AccessoryCategory::Sensor,
        setup_code: DEFAULT_SETUP_CODE,
    },
    characteristics: &CONTACT_CHARACTERISTICS,
    inputs: &CONTACT_INPUTS,
};

const FAN_CHARACTERISTICS: [CharacteristicSpec; 2] = [
    CharacteristicSpec::new(
        CharacteristicId::Active,
        BINARY,
        DefaultValue::Int(1),
        Access::ReadWrite,
    ),
    CharacteristicSpec::new(
        CharacteristicId::RotationSpeed,
        ValueFormat::Int {
            min: 0,
            max: 3,
            step: 1,
        },
        DefaultValue::Int(1),
        Access::ReadWrite,
    ),
];

/// Three-speed fan controlled remotely only.
pub const FAN: AccessoryProfile = AccessoryProfile {
    kind: ProfileKind::Fan,
    info: AccessoryInfo {
        name_base: "3 Speed Fan",
        manufacturer: "renssies",
        serial_number: "037A2BABF19D",
        model: "3 Speed Fan",
        firmware_revision: FIRMWARE_REVISION,
        category: AccessoryCategory::Fan,
        setup_code: DEFAULT_SETUP_CODE,
    },
    characteristics: &FAN_CHARACTERISTICS,
    inputs: &[],
};

/// Builds `"<base>-XXYYZZ"` from the last three octets of `mac`.
///
/// `base` is cut at a character boundary so the suffix always fits.
#[must_use]
pub fn accessory_name(base: &str, mac: [u8; 6]) -> TextValue {
    let mut end = base.len().min(MAX_TEXT_LEN - NAME_SUFFIX_LEN);
    while !base.is_char_boundary(end) {
        end -= 1;
    }

    let mut name = TextValue::new();
    // cannot overflow: base is at most MAX_TEXT_LEN - NAME_SUFFIX_LEN bytes
    let _ = write!(
        name,
        "{}-{:02X}{:02X}{:02X}",
        &base[..end],
        mac[3],
        mac[4],
        mac[5]
    );
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::characteristic::CharacteristicValue;

    #[test]
    fn name_uses_last_three_octets() {
        let name = accessory_name("Sonoff Touch", [0x18, 0xfe, 0x34, 0xa1, 0x0b, 0xc2]);
        assert_eq!(name.as_str(), "Sonoff Touch-A10BC2");
    }

    #[test]
    fn long_base_is_truncated_to_fit() {
        let base = "Extremely Long Accessory Name That Keeps Going Past The Limit Ok";
        let name = accessory_name(base, [0; 6]);
        assert_eq!(name.len(), MAX_TEXT_LEN);
        assert!(name.ends_with("-000000"));
    }

    #[test]
    fn profile_defaults_fit_their_formats() {
        for kind in ProfileKind::ALL {
            for spec in kind.profile().characteristics {
                assert_eq!(spec.check(&spec.default.to_value()), Ok(()), "{kind} {}", spec.id);
            }
            for binding in kind.profile().inputs {
                assert_eq!(binding.config.validate(), Ok(()), "{kind} {}", binding.input);
            }
        }
    }

    #[test]
    fn switch_routes_button_gestures() {
        let Some(button) = SWITCH.binding(InputId::Button) else {
            panic!("switch has no button");
        };
        assert_eq!(
            button.action_for(Gesture::ShortPress),
            Some(GestureAction::Toggle(CharacteristicId::On))
        );
        assert_eq!(
            button.action_for(Gesture::LongPress),
            Some(GestureAction::FactoryReset)
        );
        assert_eq!(button.action_for(Gesture::Released), None);
    }

    #[test]
    fn fan_speed_is_stepped() {
        let Some(speed) = FAN.characteristic(CharacteristicId::RotationSpeed) else {
            panic!("fan has no speed");
        };
        assert!(speed.check(&CharacteristicValue::Int(3)).is_ok());
        assert!(speed.check(&CharacteristicValue::Int(4)).is_err());
        assert!(FAN.inputs.is_empty());
    }

    #[test]
    fn profile_names_round_trip() {
        assert_eq!(ProfileKind::from_name("Contact-Sensor"), Some(ProfileKind::ContactSensor));
        assert_eq!(ProfileKind::from_name("FAN"), Some(ProfileKind::Fan));
        assert_eq!(ProfileKind::from_name("lamp"), None);
    }
}
