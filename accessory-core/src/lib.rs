#![no_std]

// Shared logic for the GPIO accessory firmware.
//
// Everything here runs unchanged on the MCU and on the host: physical inputs
// are turned into gestures, gestures and remote writes land in the
// characteristic store, and the identify/reset activities are plain state
// machines advanced by a tick.

pub mod accessory;
pub mod characteristic;
pub mod clock;
pub mod config;
pub mod console;
pub mod input;
pub mod outputs;
pub mod sequencer;
pub mod sequences;
pub mod sync;
pub mod telemetry;
