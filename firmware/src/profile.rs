//! Build-time profile selection.

use accessory_core::accessory::AccessoryProfile;

#[cfg(all(feature = "profile-contact-sensor", feature = "profile-fan"))]
compile_error!("select at most one accessory profile feature");

#[cfg(feature = "profile-contact-sensor")]
pub const PROFILE: &AccessoryProfile = &accessory_core::accessory::CONTACT_SENSOR;

#[cfg(feature = "profile-fan")]
pub const PROFILE: &AccessoryProfile = &accessory_core::accessory::FAN;

#[cfg(not(any(feature = "profile-contact-sensor", feature = "profile-fan")))]
pub const PROFILE: &AccessoryProfile = &accessory_core::accessory::SWITCH;

/// Derives the 48-bit address used for the name suffix from the 96-bit
/// device UID. The low six bytes carry the wafer position and lot number,
/// which differ between parts.
pub fn mac_from_uid(uid: &[u8; 12]) -> [u8; 6] {
    let mut mac = [0; 6];
    mac.copy_from_slice(&uid[6..]);
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_uses_trailing_uid_bytes() {
        let uid = [0, 1, 2, 3, 4, 5, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        assert_eq!(mac_from_uid(&uid), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn selected_profile_registers_name_prefix() {
        assert!(!PROFILE.info.name_base.is_empty());
        assert!(PROFILE.inputs.len() <= accessory_core::accessory::MAX_INPUTS);
    }
}
