//! Factory reset: flash, clear network config, clear accessory config, restart.
//!
//! Stages run strictly in order and are never skipped. A clear that fails or is
//! not confirmed within [`ResetTiming::clear_timeout`] is recorded and the
//! sequence moves on anyway, so the device always ends in a restart. Once
//! triggered the sequence cannot be cancelled.

use core::fmt;
use core::time::Duration;

use crate::clock::AccessoryInstant;
use crate::outputs::{OutputLease, OutputSink};
use crate::sequences::{BlinkTemplate, RESET_FEEDBACK_TEMPLATE, ResetTiming};
use crate::sync::{Notifier, Synchronizer};
use crate::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

use super::{ActivityKind, ActivityState, BlinkProgress, BlinkRunner, TriggerOutcome};

/// Stages of the reset sequence, in execution order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetStage {
    Idle,
    VisualFeedback,
    ClearNetworkConfig,
    ClearAccessoryConfig,
    Restarting,
}

impl fmt::Display for ResetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetStage::Idle => f.write_str("idle"),
            ResetStage::VisualFeedback => f.write_str("visual-feedback"),
            ResetStage::ClearNetworkConfig => f.write_str("clear-network-config"),
            ResetStage::ClearAccessoryConfig => f.write_str("clear-accessory-config"),
            ResetStage::Restarting => f.write_str("restarting"),
        }
    }
}

/// Persistent configuration cleared by the sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigTarget {
    Network,
    Accessory,
}

impl fmt::Display for ConfigTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigTarget::Network => f.write_str("network"),
            ConfigTarget::Accessory => f.write_str("accessory"),
        }
    }
}

/// A reset hook could not clear its configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigClearError {
    /// Backing storage rejected the erase.
    Storage,
    /// Collaborator is busy and refused the request.
    Busy,
    /// No collaborator is attached.
    Unavailable,
}

impl fmt::Display for ConfigClearError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigClearError::Storage => f.write_str("storage error"),
            ConfigClearError::Busy => f.write_str("collaborator busy"),
            ConfigClearError::Unavailable => f.write_str("collaborator unavailable"),
        }
    }
}

/// Immediate answer from a clear request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClearAck {
    Confirmed,
    /// Accepted; completion is reported through [`ConfigResetHook::poll_cleared`].
    Pending,
}

/// Network-config and accessory-config reset hooks.
pub trait ConfigResetHook {
    fn clear(&mut self) -> Result<ClearAck, ConfigClearError>;

    /// Polled while a clear is pending.
    fn poll_cleared(&mut self) -> bool {
        true
    }
}

/// Device restart hook. On hardware `restart` does not return; host
/// implementations may return and the sequencer then stays in `Restarting`.
pub trait RestartHook {
    fn restart(&mut self);
}

/// External collaborators used by the reset sequence.
#[derive(Debug, Default)]
pub struct ResetHooks<W, A, R> {
    pub network: W,
    pub accessory: A,
    pub restart: R,
}

impl<W, A, R> ResetHooks<W, A, R> {
    pub const fn new(network: W, accessory: A, restart: R) -> Self {
        Self {
            network,
            accessory,
            restart,
        }
    }
}

/// How a clear stage ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClearResult {
    NotRun,
    Confirmed,
    TimedOut,
    Failed(ConfigClearError),
}

/// Summary of the clear stages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResetReport {
    pub network: ClearResult,
    pub accessory: ClearResult,
    /// Characteristics changed when accessory state went back to defaults.
    pub restored: usize,
}

impl ResetReport {
    const EMPTY: Self = Self {
        network: ClearResult::NotRun,
        accessory: ClearResult::NotRun,
        restored: 0,
    };
}

#[derive(Copy, Clone, Debug)]
enum ClearPhase<I> {
    Waiting { deadline: I },
    Settling { until: I },
}

/// Drives the reset stages from `tick`.
pub struct ResetSequencer<I> {
    timing: ResetTiming,
    template: BlinkTemplate,
    stage: ResetStage,
    triggered_at: Option<I>,
    feedback: Option<(OutputLease, BlinkRunner<I>)>,
    clear: Option<ClearPhase<I>>,
    report: ResetReport,
}

impl<I> ResetSequencer<I>
where
    I: AccessoryInstant,
{
    #[must_use]
    pub const fn new(timing: ResetTiming) -> Self {
        Self {
            timing,
            template: RESET_FEEDBACK_TEMPLATE,
            stage: ResetStage::Idle,
            triggered_at: None,
            feedback: None,
            clear: None,
            report: ResetReport::EMPTY,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> ResetStage {
        self.stage
    }

    #[must_use]
    pub const fn state(&self) -> ActivityState {
        match self.stage {
            ResetStage::Idle => ActivityState::Idle,
            ResetStage::Restarting => ActivityState::Completed,
            _ => ActivityState::Running,
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        !matches!(self.stage, ResetStage::Idle)
    }

    #[must_use]
    pub const fn report(&self) -> ResetReport {
        self.report
    }

    #[must_use]
    pub const fn timing(&self) -> ResetTiming {
        self.timing
    }

    /// Starts the sequence. Any trigger after the first is ignored.
    pub fn trigger<const T: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) -> TriggerOutcome {
        if self.is_running() {
            telemetry.record_activity(
                TelemetryEventKind::ActivityIgnored(ActivityKind::Reset),
                self.triggered_at,
                now,
            );
            return TriggerOutcome::Ignored;
        }

        self.triggered_at = Some(now);
        telemetry.record_activity(
            TelemetryEventKind::ActivityStarted(ActivityKind::Reset),
            None,
            now,
        );
        self.enter(ResetStage::VisualFeedback, telemetry, now);
        TriggerOutcome::Started
    }

    /// Performs every stage transition that is due at `now`.
    pub fn tick<S, N, W, A, R, const C: usize, const T: usize>(
        &mut self,
        sync: &mut Synchronizer<S, N, C>,
        hooks: &mut ResetHooks<W, A, R>,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) where
        S: OutputSink,
        N: Notifier,
        W: ConfigResetHook,
        A: ConfigResetHook,
        R: RestartHook,
    {
        while self.advance(sync, hooks, telemetry, now) {}
    }

    fn advance<S, N, W, A, R, const C: usize, const T: usize>(
        &mut self,
        sync: &mut Synchronizer<S, N, C>,
        hooks: &mut ResetHooks<W, A, R>,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) -> bool
    where
        S: OutputSink,
        N: Notifier,
        W: ConfigResetHook,
        A: ConfigResetHook,
        R: RestartHook,
    {
        let progressed = match self.stage {
            ResetStage::Idle | ResetStage::Restarting => false,
            ResetStage::VisualFeedback => self.drive_feedback(sync, telemetry, now),
            ResetStage::ClearNetworkConfig => {
                self.drive_clear(ConfigTarget::Network, &mut hooks.network, telemetry, now)
            }
            ResetStage::ClearAccessoryConfig => {
                if self.clear.is_none() {
                    self.report.restored = sync.restore_defaults();
                }
                self.drive_clear(ConfigTarget::Accessory, &mut hooks.accessory, telemetry, now)
            }
        };

        if progressed && self.stage == ResetStage::Restarting {
            hooks.restart.restart();
            return false;
        }
        progressed
    }

    fn drive_feedback<S, N, const C: usize, const T: usize>(
        &mut self,
        sync: &mut Synchronizer<S, N, C>,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) -> bool
    where
        S: OutputSink,
        N: Notifier,
    {
        let outputs = sync.outputs_mut();
        match self.feedback.as_mut() {
            Some((lease, runner)) => {
                if runner.advance(lease, outputs, now) == BlinkProgress::Running {
                    return false;
                }
            }
            None => match outputs.acquire(self.template.line, self.template.owner()) {
                Ok(lease) => {
                    let runner = BlinkRunner::start(self.template, &lease, outputs, now);
                    self.feedback = Some((lease, runner));
                    return false;
                }
                // LED still held while identify winds down. Skip the flash
                // once the clear timeout has passed.
                Err(_) => {
                    let waited = self.triggered_at.map_or(Duration::ZERO, |start| {
                        now.saturating_duration_since(start)
                    });
                    if waited < self.timing.clear_timeout {
                        return false;
                    }
                }
            },
        }

        if let Some((lease, _)) = self.feedback.take() {
            outputs.release(lease);
        }
        self.enter(ResetStage::ClearNetworkConfig, telemetry, now);
        true
    }

    fn drive_clear<H, const T: usize>(
        &mut self,
        target: ConfigTarget,
        hook: &mut H,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) -> bool
    where
        H: ConfigResetHook,
    {
        match self.clear {
            None => {
                let result = match hook.clear() {
                    Ok(ClearAck::Confirmed) => ClearResult::Confirmed,
                    Ok(ClearAck::Pending) => {
                        self.clear = Some(ClearPhase::Waiting {
                            deadline: now + self.timing.clear_timeout,
                        });
                        return true;
                    }
                    Err(error) => {
                        telemetry.record(
                            TelemetryEventKind::ConfigClearFailed(target),
                            TelemetryPayload::ClearError(error),
                            now,
                        );
                        ClearResult::Failed(error)
                    }
                };
                self.settle(target, result, now);
                true
            }
            Some(ClearPhase::Waiting { deadline }) => {
                if hook.poll_cleared() {
                    self.settle(target, ClearResult::Confirmed, now);
                    true
                } else if now >= deadline {
                    telemetry.record_activity(
                        TelemetryEventKind::ConfigClearTimedOut(target),
                        self.triggered_at,
                        now,
                    );
                    self.settle(target, ClearResult::TimedOut, now);
                    true
                } else {
                    false
                }
            }
            Some(ClearPhase::Settling { until }) => {
                if now < until {
                    return false;
                }
                self.clear = None;
                let next = match target {
                    ConfigTarget::Network => ResetStage::ClearAccessoryConfig,
                    ConfigTarget::Accessory => ResetStage::Restarting,
                };
                self.enter(next, telemetry, now);
                true
            }
        }
    }

    fn settle(&mut self, target: ConfigTarget, result: ClearResult, now: I) {
        match target {
            ConfigTarget::Network => self.report.network = result,
            ConfigTarget::Accessory => self.report.accessory = result,
        }
        self.clear = Some(ClearPhase::Settling {
            until: now + self.timing.settle,
        });
    }

    fn enter<const T: usize>(
        &mut self,
        stage: ResetStage,
        telemetry: &mut TelemetryRecorder<I, T>,
        now: I,
    ) {
        self.stage = stage;
        telemetry.record_activity(
            TelemetryEventKind::ResetStageEntered(stage),
            self.triggered_at,
            now,
        );
    }
}
