//! Physical outputs and exclusive ownership while a sequencer blinks them.
//!
//! Normal operation drives outputs from committed characteristic values. The
//! identify and reset sequencers take an [`OutputLease`] on a pin; while the
//! lease is held normal drives are recorded but not applied, and releasing the
//! lease puts the pin back to the last value normal operation asked for.

use core::fmt;

use crate::input::{Level, Polarity};

/// Number of entries in [`ALL_OUTPUTS`].
pub const OUTPUT_COUNT: usize = 2;

/// Logical outputs wired on the supported boards.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputId {
    Relay,
    StatusLed,
}

impl OutputId {
    /// Deterministic index for lookups into [`ALL_OUTPUTS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            OutputId::Relay => 0,
            OutputId::StatusLed => 1,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(OutputId::Relay),
            1 => Some(OutputId::StatusLed),
            _ => None,
        }
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(output_by_id(*self).name)
    }
}

/// How an output is wired.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OutputLine {
    pub id: OutputId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    pub polarity: Polarity,
}

impl OutputLine {
    pub const fn new(
        id: OutputId,
        name: &'static str,
        mcu_pin: &'static str,
        polarity: Polarity,
    ) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            polarity,
        }
    }
}

/// Compile-time catalog of every output line.
pub const ALL_OUTPUTS: [OutputLine; OUTPUT_COUNT] = [
    OutputLine::new(OutputId::Relay, "relay", "PB4", Polarity::ActiveHigh),
    OutputLine::new(OutputId::StatusLed, "led", "PA5", Polarity::ActiveLow),
];

#[must_use]
pub const fn output_by_id(id: OutputId) -> OutputLine {
    ALL_OUTPUTS[id.as_index()]
}

/// Hardware seam for driving output pins. Takes effect before returning.
pub trait OutputSink {
    fn set_output(&mut self, pin: OutputId, level: Level);
}

/// Sink that discards every write.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputSink;

impl OutputSink for NoopOutputSink {
    fn set_output(&mut self, _pin: OutputId, _level: Level) {}
}

/// Activities that can hold an output exclusively.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputOwner {
    Identify,
    ResetFeedback,
}

/// Proof of exclusive ownership of one output. Hand it back with
/// [`OutputBank::release`].
#[derive(Debug, Eq, PartialEq)]
#[must_use = "a lease must be released to restore the output"]
pub struct OutputLease {
    pin: OutputId,
    owner: OutputOwner,
}

impl OutputLease {
    #[must_use]
    pub const fn pin(&self) -> OutputId {
        self.pin
    }

    #[must_use]
    pub const fn owner(&self) -> OutputOwner {
        self.owner
    }
}

/// Output already leased to another activity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LeaseError {
    pub pin: OutputId,
    pub holder: OutputOwner,
}

impl fmt::Display for LeaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is held by {:?}", self.pin, self.holder)
    }
}

/// Result of a normal-operation drive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriveOutcome {
    Applied,
    /// Pin is leased; the value is applied when the lease is released.
    Deferred,
}

/// Owns the output sink and tracks desired state and leases per pin.
#[derive(Debug)]
pub struct OutputBank<S> {
    sink: S,
    desired: [bool; OUTPUT_COUNT],
    holders: [Option<OutputOwner>; OUTPUT_COUNT],
}

impl<S> OutputBank<S>
where
    S: OutputSink,
{
    /// Wraps `sink`; every output starts logically off.
    pub const fn new(sink: S) -> Self {
        Self {
            sink,
            desired: [false; OUTPUT_COUNT],
            holders: [None; OUTPUT_COUNT],
        }
    }

    /// Drives every unleased output to its desired level.
    pub fn sync_all(&mut self) {
        for line in &ALL_OUTPUTS {
            if self.holders[line.id.as_index()].is_none() {
                let on = self.desired[line.id.as_index()];
                self.write(line.id, on);
            }
        }
    }

    /// Normal-operation drive.
    pub fn drive(&mut self, pin: OutputId, on: bool) -> DriveOutcome {
        self.desired[pin.as_index()] = on;
        if self.holders[pin.as_index()].is_some() {
            DriveOutcome::Deferred
        } else {
            self.write(pin, on);
            DriveOutcome::Applied
        }
    }

    /// Value normal operation wants on `pin`.
    #[must_use]
    pub fn desired(&self, pin: OutputId) -> bool {
        self.desired[pin.as_index()]
    }

    #[must_use]
    pub fn holder(&self, pin: OutputId) -> Option<OutputOwner> {
        self.holders[pin.as_index()]
    }

    /// Takes exclusive ownership of `pin`.
    pub fn acquire(&mut self, pin: OutputId, owner: OutputOwner) -> Result<OutputLease, LeaseError> {
        let slot = &mut self.holders[pin.as_index()];
        if let Some(holder) = *slot {
            return Err(LeaseError { pin, holder });
        }
        *slot = Some(owner);
        Ok(OutputLease { pin, owner })
    }

    /// Drives a leased pin.
    pub fn drive_leased(&mut self, lease: &OutputLease, on: bool) {
        debug_assert_eq!(self.holders[lease.pin.as_index()], Some(lease.owner));
        self.write(lease.pin, on);
    }

    /// Ends the lease and restores the pin to the desired value.
    pub fn release(&mut self, lease: OutputLease) {
        let index = lease.pin.as_index();
        self.holders[index] = None;
        let on = self.desired[index];
        self.write(lease.pin, on);
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn write(&mut self, pin: OutputId, on: bool) {
        let level = output_by_id(pin).polarity.level_for(on);
        self.sink.set_output(pin, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct RecordingSink {
        writes: Vec<(OutputId, Level), 16>,
    }

    impl OutputSink for RecordingSink {
        fn set_output(&mut self, pin: OutputId, level: Level) {
            self.writes.push((pin, level)).expect("write log overflow");
        }
    }

    #[test]
    fn polarity_is_applied_on_write() {
        let mut bank = OutputBank::new(RecordingSink::default());
        bank.drive(OutputId::StatusLed, true);
        bank.drive(OutputId::Relay, true);
        assert_eq!(
            bank.sink().writes.as_slice(),
            &[(OutputId::StatusLed, Level::Low), (OutputId::Relay, Level::High)]
        );
    }

    #[test]
    fn leased_pin_defers_normal_drive_until_release() {
        let mut bank = OutputBank::new(RecordingSink::default());
        let lease = bank
            .acquire(OutputId::Relay, OutputOwner::Identify)
            .expect("relay free");
        bank.drive_leased(&lease, true);

        assert_eq!(bank.drive(OutputId::Relay, true), DriveOutcome::Deferred);
        bank.drive_leased(&lease, false);
        bank.release(lease);

        assert_eq!(
            bank.sink().writes.last(),
            Some(&(OutputId::Relay, Level::High))
        );
        assert_eq!(bank.holder(OutputId::Relay), None);
    }

    #[test]
    fn second_acquire_is_rejected() {
        let mut bank = OutputBank::new(NoopOutputSink);
        let lease = bank
            .acquire(OutputId::StatusLed, OutputOwner::Identify)
            .expect("led free");
        assert_eq!(
            bank.acquire(OutputId::StatusLed, OutputOwner::ResetFeedback),
            Err(LeaseError {
                pin: OutputId::StatusLed,
                holder: OutputOwner::Identify,
            })
        );
        bank.release(lease);
        assert!(
            bank.acquire(OutputId::StatusLed, OutputOwner::ResetFeedback)
                .is_ok()
        );
    }
}
