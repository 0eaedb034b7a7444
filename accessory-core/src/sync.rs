//! Canonical characteristic store with change-only notifications.
//!
//! Every mutation goes through [`Synchronizer::apply`] on `&mut self`, so the
//! gesture path, the remote-write path and the reset path are serialized by
//! whoever owns the synchronizer. A committed change drives its actuator
//! output first and notifies second.

use core::fmt;

use heapless::Vec;

use crate::characteristic::{
    Access, Characteristic, CharacteristicId, CharacteristicSpec, CharacteristicValue,
    Generation, WriteError,
};
use crate::outputs::{OutputBank, OutputSink};

/// Upper bound on characteristics per accessory.
pub const MAX_CHARACTERISTICS: usize = 8;

/// Where a write came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOrigin {
    /// Gesture on a physical input.
    Local,
    /// Accessory-protocol client.
    Remote,
    /// Factory reset restoring defaults.
    Reset,
}

impl fmt::Display for WriteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOrigin::Local => f.write_str("local"),
            WriteOrigin::Remote => f.write_str("remote"),
            WriteOrigin::Reset => f.write_str("reset"),
        }
    }
}

/// Result of a write that passed validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApplyOutcome {
    Changed(Generation),
    Unchanged,
}

impl ApplyOutcome {
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, ApplyOutcome::Changed(_))
    }
}

/// Accessory-protocol notification sink. Called exactly once per committed change.
pub trait Notifier {
    fn notify(&mut self, id: CharacteristicId, value: &CharacteristicValue, generation: Generation);
}

/// Notifier that drops every notification.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&mut self, _id: CharacteristicId, _value: &CharacteristicValue, _generation: Generation) {
    }
}

/// Entry point for writes issued by a remote accessory-protocol client.
pub trait RemoteWriteHandler {
    fn on_remote_write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> Result<ApplyOutcome, WriteError>;
}

/// Errors raised while registering characteristics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegistrationError {
    Full,
    Duplicate(CharacteristicId),
    InvalidDefault(CharacteristicId),
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::Full => f.write_str("characteristic store is full"),
            RegistrationError::Duplicate(id) => write!(f, "{id} registered twice"),
            RegistrationError::InvalidDefault(id) => write!(f, "default for {id} violates its format"),
        }
    }
}

/// Owns the characteristic values, the outputs they drive and the notifier.
pub struct Synchronizer<S, N, const CAPACITY: usize = MAX_CHARACTERISTICS> {
    characteristics: Vec<Characteristic, CAPACITY>,
    last_generation: Generation,
    outputs: OutputBank<S>,
    notifier: N,
}

impl<S, N, const CAPACITY: usize> Synchronizer<S, N, CAPACITY>
where
    S: OutputSink,
    N: Notifier,
{
    pub const fn new(outputs: OutputBank<S>, notifier: N) -> Self {
        Self {
            characteristics: Vec::new(),
            last_generation: Generation::INITIAL,
            outputs,
            notifier,
        }
    }

    /// Adds a characteristic initialised to its declared default.
    pub fn register(&mut self, spec: CharacteristicSpec) -> Result<(), RegistrationError> {
        self.register_with_value(spec, spec.default.to_value())
    }

    /// Adds a characteristic with an explicit factory value.
    pub fn register_with_value(
        &mut self,
        spec: CharacteristicSpec,
        value: CharacteristicValue,
    ) -> Result<(), RegistrationError> {
        if self.get(spec.id).is_some() {
            return Err(RegistrationError::Duplicate(spec.id));
        }
        spec.check(&value)
            .map_err(|_| RegistrationError::InvalidDefault(spec.id))?;
        self.characteristics
            .push(Characteristic::with_value(spec, value))
            .map_err(|_| RegistrationError::Full)
    }

    /// Drives every actuator from its committed value. Used once at start-up.
    pub fn drive_actuators(&mut self) {
        for characteristic in &self.characteristics {
            if let Some(pin) = characteristic.spec().actuator {
                self.outputs.drive(pin, characteristic.value().is_truthy());
            }
        }
        self.outputs.sync_all();
    }

    /// Applies a write.
    ///
    /// Returns `Changed` with the new generation when the value differs from the
    /// committed one, after driving the actuator and notifying exactly once.
    /// Equal values return `Unchanged` with no side effects.
    pub fn apply(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
        origin: WriteOrigin,
    ) -> Result<ApplyOutcome, WriteError> {
        let index = self
            .index_of(id)
            .ok_or(WriteError::UnknownCharacteristic { id })?;
        let spec = *self.characteristics[index].spec();
        if origin == WriteOrigin::Remote && spec.access == Access::ReadOnly {
            return Err(WriteError::ReadOnly { id });
        }
        spec.check(&value)?;

        if self.characteristics[index].value() == &value {
            return Ok(ApplyOutcome::Unchanged);
        }

        let generation = self.last_generation.next();
        self.last_generation = generation;
        if let Some(pin) = spec.actuator {
            self.outputs.drive(pin, value.is_truthy());
        }
        let characteristic = &mut self.characteristics[index];
        characteristic.commit(value, generation);
        self.notifier.notify(id, characteristic.value(), generation);
        Ok(ApplyOutcome::Changed(generation))
    }

    /// Flips a boolean characteristic.
    pub fn toggle(&mut self, id: CharacteristicId, origin: WriteOrigin) -> Result<ApplyOutcome, WriteError> {
        let current = self
            .value(id)
            .ok_or(WriteError::UnknownCharacteristic { id })?
            .as_bool()
            .ok_or(WriteError::TypeMismatch { id })?;
        self.apply(id, CharacteristicValue::Bool(!current), origin)
    }

    /// Puts every characteristic back to its factory value. Returns how many changed.
    pub fn restore_defaults(&mut self) -> usize {
        let mut changed = 0;
        for index in 0..self.characteristics.len() {
            let characteristic = &self.characteristics[index];
            let id = characteristic.id();
            let factory = characteristic.factory_value().clone();
            if let Ok(ApplyOutcome::Changed(_)) = self.apply(id, factory, WriteOrigin::Reset) {
                changed += 1;
            }
        }
        changed
    }

    #[must_use]
    pub fn get(&self, id: CharacteristicId) -> Option<&Characteristic> {
        self.characteristics.iter().find(|c| c.id() == id)
    }

    #[must_use]
    pub fn value(&self, id: CharacteristicId) -> Option<&CharacteristicValue> {
        self.get(id).map(Characteristic::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Characteristic> {
        self.characteristics.iter()
    }

    /// Generation of the most recent commit across all characteristics.
    #[must_use]
    pub const fn last_generation(&self) -> Generation {
        self.last_generation
    }

    #[must_use]
    pub fn outputs(&self) -> &OutputBank<S> {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut OutputBank<S> {
        &mut self.outputs
    }

    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    fn index_of(&self, id: CharacteristicId) -> Option<usize> {
        self.characteristics.iter().position(|c| c.id() == id)
    }
}

impl<S, N, const CAPACITY: usize> RemoteWriteHandler for Synchronizer<S, N, CAPACITY>
where
    S: OutputSink,
    N: Notifier,
{
    fn on_remote_write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> Result<ApplyOutcome, WriteError> {
        self.apply(id, value, WriteOrigin::Remote)
    }
}
