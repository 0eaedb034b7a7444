//! Log sinks: `defmt` over RTT on the MCU, stdout on the host.

use accessory_core::accessory::{AccessoryProfile, SetupError};
use accessory_core::characteristic::{CharacteristicId, WriteError};
use accessory_core::input::{Gesture, InputId};
use accessory_core::sequencer::reset::{ConfigTarget, ResetStage};
use accessory_core::sync::ApplyOutcome;
use accessory_core::telemetry::TelemetryRecord;

use crate::clock::FirmwareInstant;
use crate::platform::Notification;

#[cfg(target_os = "none")]
pub fn log_boot(profile: &AccessoryProfile, name: &str) {
    defmt::info!(
        "accessory: {} profile up as \"{}\" ({} inputs)",
        defmt::Display2Format(&profile.kind),
        name,
        profile.inputs.len()
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_boot(profile: &AccessoryProfile, name: &str) {
    println!(
        "accessory: {} profile up as \"{}\" ({} inputs)",
        profile.kind,
        name,
        profile.inputs.len()
    );
}

#[cfg(target_os = "none")]
pub fn log_setup_failed(error: SetupError) {
    defmt::error!("accessory: setup failed: {}", defmt::Display2Format(&error));
}

#[cfg(not(target_os = "none"))]
pub fn log_setup_failed(error: SetupError) {
    println!("accessory: setup failed: {error}");
}

#[cfg(target_os = "none")]
pub fn log_gesture(input: InputId, gesture: Gesture, at: FirmwareInstant) {
    defmt::info!(
        "input: {} {} t={}us",
        input,
        gesture,
        at.into_embassy().as_micros()
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_gesture(input: InputId, gesture: Gesture, at: FirmwareInstant) {
    println!(
        "input: {input} {gesture} t={}us",
        at.into_embassy().as_micros()
    );
}

#[cfg(target_os = "none")]
pub fn log_reset_stage(stage: ResetStage, at: FirmwareInstant) {
    defmt::warn!(
        "reset: entering {} t={}us",
        stage,
        at.into_embassy().as_micros()
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_reset_stage(stage: ResetStage, at: FirmwareInstant) {
    println!(
        "reset: entering {stage} t={}us",
        at.into_embassy().as_micros()
    );
}

#[cfg(target_os = "none")]
pub fn log_telemetry(record: &TelemetryRecord<FirmwareInstant>) {
    defmt::debug!(
        "telemetry #{} t={}us {} {}",
        record.id,
        record.timestamp.into_embassy().as_micros(),
        record.event,
        defmt::Display2Format(&record.details)
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_telemetry(record: &TelemetryRecord<FirmwareInstant>) {
    println!(
        "telemetry #{} t={}us {} {}",
        record.id,
        record.timestamp.into_embassy().as_micros(),
        record.event,
        record.details
    );
}

#[cfg(target_os = "none")]
pub fn log_notification(notification: &Notification) {
    defmt::info!(
        "notify: {}={} {}",
        notification.id,
        defmt::Display2Format(&notification.value),
        notification.generation
    );
}

#[cfg(not(target_os = "none"))]
pub fn log_notification(notification: &Notification) {
    println!(
        "notify: {}={} {}",
        notification.id, notification.value, notification.generation
    );
}

#[cfg(target_os = "none")]
pub fn log_notification_dropped(id: CharacteristicId, total: u32) {
    defmt::warn!("notify: queue full, dropped {} ({} total)", id, total);
}

#[cfg(not(target_os = "none"))]
pub fn log_notification_dropped(id: CharacteristicId, total: u32) {
    println!("notify: queue full, dropped {id} ({total} total)");
}

#[cfg(target_os = "none")]
pub fn log_remote_write(id: CharacteristicId, result: &Result<ApplyOutcome, WriteError>) {
    match result {
        Ok(ApplyOutcome::Changed(generation)) => {
            defmt::info!("remote: {} changed {}", id, generation);
        }
        Ok(ApplyOutcome::Unchanged) => defmt::debug!("remote: {} unchanged", id),
        Err(error) => defmt::warn!("remote: {} rejected: {}", id, error),
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_remote_write(id: CharacteristicId, result: &Result<ApplyOutcome, WriteError>) {
    match result {
        Ok(ApplyOutcome::Changed(generation)) => println!("remote: {id} changed {generation}"),
        Ok(ApplyOutcome::Unchanged) => println!("remote: {id} unchanged"),
        Err(error) => println!("remote: {id} rejected: {error}"),
    }
}

#[cfg(target_os = "none")]
pub fn log_clear_requested(target: ConfigTarget, queued: bool) {
    if queued {
        defmt::info!("reset: requested {} config clear", target);
    } else {
        defmt::warn!("reset: no protocol stack took the {} clear request", target);
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_clear_requested(target: ConfigTarget, queued: bool) {
    if queued {
        println!("reset: requested {target} config clear");
    } else {
        println!("reset: no protocol stack took the {target} clear request");
    }
}

#[cfg(target_os = "none")]
pub fn log_clear_acknowledged(target: ConfigTarget, accepted: bool) {
    if accepted {
        defmt::info!("reset: {} config cleared", target);
    } else {
        defmt::warn!("reset: unexpected {} clear acknowledgement", target);
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_clear_acknowledged(target: ConfigTarget, accepted: bool) {
    if accepted {
        println!("reset: {target} config cleared");
    } else {
        println!("reset: unexpected {target} clear acknowledgement");
    }
}

#[cfg(target_os = "none")]
pub fn log_restart() {
    defmt::warn!("reset: restarting");
}

#[cfg(not(target_os = "none"))]
pub fn log_restart() {
    println!("reset: restarting");
}
