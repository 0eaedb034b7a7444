//! Structured event log shared by firmware and host targets.
//!
//! The core has no logging side effects of its own. Pipeline, synchronizer and
//! sequencers append compact records to a fixed-size ring that the firmware
//! drains to `defmt` and the emulator prints to the console.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::characteristic::{CharacteristicId, Generation, WriteError};
use crate::clock::AccessoryInstant;
use crate::input::{Gesture, InputId, InvariantViolation, Level};
use crate::sequencer::ActivityKind;
use crate::sequencer::reset::{ConfigClearError, ConfigTarget, ResetStage};
use crate::sync::WriteOrigin;

/// Sequential identifier assigned to every record. Wraps on overflow.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryEventKind {
    EdgeDetected(InputId),
    GestureClassified(InputId),
    PressAbandoned(InputId),
    SampleDropped(InputId),
    InvariantViolation(InputId),
    CharacteristicChanged(CharacteristicId),
    WriteRejected(CharacteristicId),
    ActivityStarted(ActivityKind),
    ActivityIgnored(ActivityKind),
    ActivityCompleted(ActivityKind),
    ActivityCancelled(ActivityKind),
    ResetStageEntered(ResetStage),
    ConfigClearFailed(ConfigTarget),
    ConfigClearTimedOut(ConfigTarget),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::EdgeDetected(input) => write!(f, "edge {input}"),
            TelemetryEventKind::GestureClassified(input) => write!(f, "gesture {input}"),
            TelemetryEventKind::PressAbandoned(input) => write!(f, "press-abandoned {input}"),
            TelemetryEventKind::SampleDropped(input) => write!(f, "sample-dropped {input}"),
            TelemetryEventKind::InvariantViolation(input) => {
                write!(f, "invariant-violation {input}")
            }
            TelemetryEventKind::CharacteristicChanged(id) => write!(f, "changed {id}"),
            TelemetryEventKind::WriteRejected(id) => write!(f, "write-rejected {id}"),
            TelemetryEventKind::ActivityStarted(kind) => write!(f, "{kind} started"),
            TelemetryEventKind::ActivityIgnored(kind) => write!(f, "{kind} ignored"),
            TelemetryEventKind::ActivityCompleted(kind) => write!(f, "{kind} completed"),
            TelemetryEventKind::ActivityCancelled(kind) => write!(f, "{kind} cancelled"),
            TelemetryEventKind::ResetStageEntered(stage) => write!(f, "reset-stage {stage}"),
            TelemetryEventKind::ConfigClearFailed(target) => write!(f, "clear-failed {target}"),
            TelemetryEventKind::ConfigClearTimedOut(target) => {
                write!(f, "clear-timed-out {target}")
            }
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryPayload {
    None,
    Edge { from: Level, to: Level },
    Gesture { gesture: Gesture, held: Option<Duration> },
    Change { generation: Generation, origin: WriteOrigin },
    Rejected(WriteError),
    Violation(InvariantViolation),
    ClearError(ConfigClearError),
    /// Time since the activity was triggered.
    Elapsed(Duration),
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Edge { from, to } => write!(f, "{from}->{to}"),
            TelemetryPayload::Gesture {
                gesture,
                held: Some(held),
            } => write!(f, "{gesture} held={}ms", held.as_millis()),
            TelemetryPayload::Gesture { gesture, held: None } => write!(f, "{gesture}"),
            TelemetryPayload::Change { generation, origin } => {
                write!(f, "{generation} origin={origin}")
            }
            TelemetryPayload::Rejected(error) => write!(f, "{error}"),
            TelemetryPayload::Violation(violation) => write!(f, "{violation}"),
            TelemetryPayload::ClearError(error) => write!(f, "{error}"),
            TelemetryPayload::Elapsed(elapsed) => write!(f, "+{}ms", elapsed.as_millis()),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord<I> {
    pub id: EventId,
    pub timestamp: I,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord<I>, CAPACITY>,
    next_event_id: EventId,
}

impl<I, const CAPACITY: usize> TelemetryRecorder<I, CAPACITY>
where
    I: AccessoryInstant,
{
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records an event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        details: TelemetryPayload,
        timestamp: I,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details,
        });
        id
    }

    /// Records a committed characteristic change.
    pub fn record_change(
        &mut self,
        id: CharacteristicId,
        generation: Generation,
        origin: WriteOrigin,
        timestamp: I,
    ) -> EventId {
        self.record(
            TelemetryEventKind::CharacteristicChanged(id),
            TelemetryPayload::Change { generation, origin },
            timestamp,
        )
    }

    /// Records an activity transition with the time since it was triggered.
    pub fn record_activity(
        &mut self,
        event: TelemetryEventKind,
        triggered_at: Option<I>,
        timestamp: I,
    ) -> EventId {
        let details = triggered_at.map_or(TelemetryPayload::None, |start| {
            TelemetryPayload::Elapsed(timestamp.saturating_duration_since(start))
        });
        self.record(event, details, timestamp)
    }

    /// Iterates the retained records oldest first.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<I>> {
        self.ring.oldest_ordered()
    }

    /// Records newer than `last`. When `last` is `None` or has already been
    /// overwritten, every retained record is returned.
    pub fn records_after(
        &self,
        last: Option<EventId>,
    ) -> impl Iterator<Item = &TelemetryRecord<I>> + '_ {
        let skip = last
            .and_then(|last| self.oldest_first().position(|record| record.id == last))
            .map_or(0, |position| position + 1);
        self.oldest_first().skip(skip)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<I>> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of records matching `predicate`.
    pub fn count_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&TelemetryEventKind) -> bool,
    {
        self.oldest_first()
            .filter(|record| predicate(&record.event))
            .count()
    }
}

impl<I, const CAPACITY: usize> Default for TelemetryRecorder<I, CAPACITY>
where
    I: AccessoryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MicrosInstant;

    #[test]
    fn ring_keeps_most_recent_records() {
        let mut recorder: TelemetryRecorder<MicrosInstant, 4> = TelemetryRecorder::new();
        for ms in 0..6 {
            recorder.record(
                TelemetryEventKind::SampleDropped(InputId::Button),
                TelemetryPayload::None,
                MicrosInstant::from_millis(ms),
            );
        }

        assert_eq!(recorder.len(), 4);
        let ids: heapless::Vec<EventId, 4> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[2, 3, 4, 5]);
        assert_eq!(recorder.latest().map(|record| record.id), Some(5));
    }

    #[test]
    fn records_after_resumes_from_cursor() {
        let mut recorder: TelemetryRecorder<MicrosInstant, 8> = TelemetryRecorder::new();
        let first = recorder.record(
            TelemetryEventKind::EdgeDetected(InputId::Button),
            TelemetryPayload::Edge {
                from: Level::High,
                to: Level::Low,
            },
            MicrosInstant::ZERO,
        );
        recorder.record_change(
            CharacteristicId::On,
            Generation::INITIAL.next(),
            WriteOrigin::Local,
            MicrosInstant::from_millis(1),
        );

        assert_eq!(recorder.records_after(None).count(), 2);
        let newer: heapless::Vec<TelemetryEventKind, 2> = recorder
            .records_after(Some(first))
            .map(|record| record.event)
            .collect();
        assert_eq!(
            newer.as_slice(),
            &[TelemetryEventKind::CharacteristicChanged(CharacteristicId::On)]
        );
        // unknown cursor falls back to the full history
        assert_eq!(recorder.records_after(Some(99)).count(), 2);
    }

    #[test]
    fn activity_records_elapsed_time() {
        let mut recorder: TelemetryRecorder<MicrosInstant> = TelemetryRecorder::new();
        recorder.record_activity(
            TelemetryEventKind::ActivityCompleted(ActivityKind::Identify),
            Some(MicrosInstant::from_millis(100)),
            MicrosInstant::from_millis(2_050),
        );
        let latest = recorder.latest().expect("record stored");
        assert_eq!(
            latest.details,
            TelemetryPayload::Elapsed(Duration::from_millis(1_950))
        );
    }
}
