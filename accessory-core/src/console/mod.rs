//! Bench console shared by the emulator and on-target debugging.
//!
//! Lines are tokenized and parsed in [`grammar`] against the table in
//! [`catalog`]; [`commands`] drives a [`commands::ConsoleTarget`] with the
//! result.

pub mod catalog;
pub mod commands;
pub mod grammar;
