//! Monotonic time abstraction shared by the pipeline and the sequencers.

use core::ops::Add;
use core::time::Duration;

/// Instant type accepted by every time-dependent component.
///
/// Firmware uses a wrapper around `embassy_time::Instant`; the emulator and
/// tests use [`MicrosInstant`].
pub trait AccessoryInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the elapsed time since `earlier`, clamping to zero when `earlier` is newer.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Microsecond counter instant used on the host.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MicrosInstant(u64);

impl MicrosInstant {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}

impl Add<Duration> for MicrosInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl AccessoryInstant for MicrosInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}
