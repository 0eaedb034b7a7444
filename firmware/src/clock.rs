//! Embassy-backed instant for the accessory core.

use core::ops::Add;

use accessory_core::clock::AccessoryInstant;
use embassy_time::{Duration, Instant};

/// `embassy_time::Instant` wrapped so the core's timing traits can be implemented on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<core::time::Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: core::time::Duration) -> Self::Output {
        let sum = self
            .0
            .checked_add(core_duration_to_embassy(rhs))
            .unwrap_or(Instant::MAX);
        Self(sum)
    }
}

impl AccessoryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> core::time::Duration {
        self.0
            .checked_duration_since(earlier.0)
            .map_or(core::time::Duration::ZERO, embassy_duration_to_core)
    }
}

pub fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

pub fn embassy_duration_to_core(duration: Duration) -> core::time::Duration {
    core::time::Duration::from_micros(duration.as_micros())
}
