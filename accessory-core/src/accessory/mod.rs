//! The accessory aggregate: inputs, characteristic store and activities.
//!
//! [`Accessory`] owns every piece of mutable state. Firmware keeps it behind a
//! blocking mutex so sampling, remote writes and sequencer ticks are
//! serialised; the emulator owns it directly.

use heapless::Vec;

use crate::characteristic::{CharacteristicId, CharacteristicValue, TextValue, WriteError};
use crate::clock::AccessoryInstant;
use crate::config::{ConfigError, InputConfig};
use crate::input::{Gesture, InputChannel, InputId, InputSource, RawSample, TransientSampleError};
use crate::outputs::OutputSink;
use crate::sequencer::reset::{ConfigResetHook, RestartHook};
use crate::sequencer::{IdentifySequencer, ResetHooks, ResetSequencer, TriggerOutcome};
use crate::sequences::ResetTiming;
use crate::sync::{
    ApplyOutcome, Notifier, RegistrationError, RemoteWriteHandler, Synchronizer, WriteOrigin,
};
use crate::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

pub mod profile;

pub use profile::{
    AccessoryCategory, AccessoryInfo, AccessoryProfile, CONTACT_SENSOR, FAN, GestureAction,
    GestureRoute, InputBinding, ProfileKind, SWITCH, accessory_name,
};

/// Most physical inputs a profile may bind.
pub const MAX_INPUTS: usize = 2;

/// Hardware and collaborator types an accessory runs against.
pub trait Platform {
    type Instant: AccessoryInstant;
    type Outputs: OutputSink;
    type Notifier: Notifier;
    type NetworkReset: ConfigResetHook;
    type AccessoryReset: ConfigResetHook;
    type Restart: RestartHook;
}

pub type PlatformHooks<P> = ResetHooks<
    <P as Platform>::NetworkReset,
    <P as Platform>::AccessoryReset,
    <P as Platform>::Restart,
>;

/// Rejected accessory construction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SetupError {
    Registration(RegistrationError),
    TooManyInputs,
}

impl core::fmt::Display for SetupError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SetupError::Registration(error) => write!(f, "{error}"),
            SetupError::TooManyInputs => f.write_str("profile binds too many inputs"),
        }
    }
}

impl From<RegistrationError> for SetupError {
    fn from(error: RegistrationError) -> Self {
        SetupError::Registration(error)
    }
}

/// A running accessory.
pub struct Accessory<P: Platform> {
    profile: &'static AccessoryProfile,
    sync: Synchronizer<P::Outputs, P::Notifier>,
    inputs: Vec<InputChannel<P::Instant>, MAX_INPUTS>,
    identify: IdentifySequencer<P::Instant>,
    reset: ResetSequencer<P::Instant>,
    hooks: PlatformHooks<P>,
    telemetry: TelemetryRecorder<P::Instant>,
    last_seen: P::Instant,
}

impl<P: Platform> Accessory<P> {
    /// Registers the profile's characteristics, builds its input channels and
    /// drives every actuator to its initial value.
    pub fn new(
        profile: &'static AccessoryProfile,
        mac: [u8; 6],
        sync: Synchronizer<P::Outputs, P::Notifier>,
        hooks: PlatformHooks<P>,
        now: P::Instant,
    ) -> Result<Self, SetupError> {
        Self::with_timing(profile, mac, sync, hooks, ResetTiming::DEFAULT, now)
    }

    pub fn with_timing(
        profile: &'static AccessoryProfile,
        mac: [u8; 6],
        mut sync: Synchronizer<P::Outputs, P::Notifier>,
        hooks: PlatformHooks<P>,
        timing: ResetTiming,
        now: P::Instant,
    ) -> Result<Self, SetupError> {
        let name = accessory_name(profile.info.name_base, mac);
        sync.register_with_value(profile::NAME_SPEC, CharacteristicValue::Text(name))?;
        for spec in profile.characteristics {
            sync.register(*spec)?;
        }

        let mut inputs = Vec::new();
        for binding in profile.inputs {
            let channel =
                InputChannel::new(binding.input, binding.role, binding.polarity, binding.config);
            inputs.push(channel).map_err(|_| SetupError::TooManyInputs)?;
        }

        sync.drive_actuators();

        Ok(Self {
            profile,
            sync,
            inputs,
            identify: IdentifySequencer::new(),
            reset: ResetSequencer::new(timing),
            hooks,
            telemetry: TelemetryRecorder::new(),
            last_seen: now,
        })
    }

    #[must_use]
    pub const fn profile(&self) -> &'static AccessoryProfile {
        self.profile
    }

    /// Advertised accessory name.
    #[must_use]
    pub fn name(&self) -> Option<&TextValue> {
        match self.sync.value(CharacteristicId::Name) {
            Some(CharacteristicValue::Text(name)) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(&self, id: CharacteristicId) -> Option<&CharacteristicValue> {
        self.sync.value(id)
    }

    #[must_use]
    pub const fn synchronizer(&self) -> &Synchronizer<P::Outputs, P::Notifier> {
        &self.sync
    }

    pub fn synchronizer_mut(&mut self) -> &mut Synchronizer<P::Outputs, P::Notifier> {
        &mut self.sync
    }

    #[must_use]
    pub const fn identify(&self) -> &IdentifySequencer<P::Instant> {
        &self.identify
    }

    #[must_use]
    pub const fn reset(&self) -> &ResetSequencer<P::Instant> {
        &self.reset
    }

    #[must_use]
    pub const fn hooks(&self) -> &PlatformHooks<P> {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut PlatformHooks<P> {
        &mut self.hooks
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<P::Instant> {
        &self.telemetry
    }

    #[must_use]
    pub fn inputs(&self) -> &[InputChannel<P::Instant>] {
        &self.inputs
    }

    #[must_use]
    pub fn input(&self, id: InputId) -> Option<&InputChannel<P::Instant>> {
        self.inputs.iter().find(|channel| channel.id() == id)
    }

    /// Replaces the timing of one input after validating it.
    pub fn reconfigure_input(&mut self, id: InputId, config: InputConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let channel = self
            .inputs
            .iter_mut()
            .find(|channel| channel.id() == id)
            .ok_or(ConfigError::UnknownInput(id))?;
        channel.reconfigure(config);
        Ok(())
    }

    /// Polls `source` and feeds the result through its channel.
    pub fn poll<S>(&mut self, source: &mut S, now: P::Instant) -> Option<Gesture>
    where
        S: InputSource<Instant = P::Instant>,
    {
        let input = source.input();
        let sample = source.poll(now);
        self.on_sample(input, sample, now)
    }

    /// Feeds one sampling tick of `input`, then acts on the resulting gesture.
    pub fn on_sample(
        &mut self,
        input: InputId,
        sample: Result<RawSample<P::Instant>, TransientSampleError>,
        now: P::Instant,
    ) -> Option<Gesture> {
        self.observe_time(now);
        let channel = self.inputs.iter_mut().find(|channel| channel.id() == input)?;
        let gesture = channel.process(sample, now, &mut self.telemetry)?;
        self.handle_gesture(input, gesture, now);
        Some(gesture)
    }

    /// Runs the action routed for `gesture` on `input`.
    pub fn handle_gesture(&mut self, input: InputId, gesture: Gesture, now: P::Instant) {
        self.observe_time(now);
        let Some(action) = self
            .profile
            .binding(input)
            .and_then(|binding| binding.action_for(gesture))
        else {
            return;
        };

        match action {
            GestureAction::Toggle(id) => {
                let result = self.sync.toggle(id, WriteOrigin::Local);
                self.record_write(id, WriteOrigin::Local, &result, now);
            }
            GestureAction::Set(id, value) => {
                let result = self.sync.apply(id, value.to_value(), WriteOrigin::Local);
                self.record_write(id, WriteOrigin::Local, &result, now);
            }
            GestureAction::FactoryReset => {
                self.trigger_reset(now);
            }
        }
    }

    /// Applies a local write.
    pub fn write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
        origin: WriteOrigin,
        now: P::Instant,
    ) -> Result<ApplyOutcome, WriteError> {
        self.observe_time(now);
        let result = self.sync.apply(id, value, origin);
        self.record_write(id, origin, &result, now);
        result
    }

    /// Handles a write from the accessory-protocol server.
    ///
    /// `Identify` is a write-only trigger: `true` starts the identify pattern,
    /// `false` does nothing, and neither is stored or notified.
    pub fn remote_write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
        now: P::Instant,
    ) -> Result<ApplyOutcome, WriteError> {
        if id != CharacteristicId::Identify {
            return self.write(id, value, WriteOrigin::Remote, now);
        }

        self.observe_time(now);
        match value {
            CharacteristicValue::Bool(true) => {
                self.trigger_identify(now);
                Ok(ApplyOutcome::Unchanged)
            }
            CharacteristicValue::Bool(false) => Ok(ApplyOutcome::Unchanged),
            _ => {
                let error = WriteError::TypeMismatch { id };
                self.telemetry.record(
                    TelemetryEventKind::WriteRejected(id),
                    TelemetryPayload::Rejected(error),
                    now,
                );
                Err(error)
            }
        }
    }

    pub fn trigger_identify(&mut self, now: P::Instant) -> TriggerOutcome {
        self.observe_time(now);
        self.identify
            .trigger(self.sync.outputs_mut(), &mut self.telemetry, now)
    }

    /// Starts the factory reset. A running identify is cancelled first so the
    /// reset feedback gets the status LED straight away.
    pub fn trigger_reset(&mut self, now: P::Instant) -> TriggerOutcome {
        self.observe_time(now);
        if self.reset.is_running() {
            return self.reset.trigger(&mut self.telemetry, now);
        }

        self.identify.cancel();
        self.identify
            .tick(self.sync.outputs_mut(), &mut self.telemetry, now);
        let outcome = self.reset.trigger(&mut self.telemetry, now);
        self.reset
            .tick(&mut self.sync, &mut self.hooks, &mut self.telemetry, now);
        outcome
    }

    /// Advances identify and reset. Call every few milliseconds.
    pub fn tick(&mut self, now: P::Instant) {
        self.observe_time(now);
        self.identify
            .tick(self.sync.outputs_mut(), &mut self.telemetry, now);
        self.reset
            .tick(&mut self.sync, &mut self.hooks, &mut self.telemetry, now);
    }

    fn record_write(
        &mut self,
        id: CharacteristicId,
        origin: WriteOrigin,
        result: &Result<ApplyOutcome, WriteError>,
        now: P::Instant,
    ) {
        match *result {
            Ok(ApplyOutcome::Changed(generation)) => {
                self.telemetry.record_change(id, generation, origin, now);
            }
            Ok(ApplyOutcome::Unchanged) => {}
            Err(error) => {
                self.telemetry.record(
                    TelemetryEventKind::WriteRejected(id),
                    TelemetryPayload::Rejected(error),
                    now,
                );
            }
        }
    }

    fn observe_time(&mut self, now: P::Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}

impl<P: Platform> RemoteWriteHandler for Accessory<P> {
    /// Uses the latest instant seen by `tick`, `on_sample` or a previous write.
    fn on_remote_write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> Result<ApplyOutcome, WriteError> {
        let now = self.last_seen;
        self.remote_write(id, value, now)
    }
}
