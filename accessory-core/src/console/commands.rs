//! Console command dispatcher.
//!
//! Parsed commands are turned into calls on a [`ConsoleTarget`]: level changes
//! on the simulated inputs, remote writes, activity triggers and the passage
//! of time. Button presses and sensor changes are synthesised here from those
//! primitives so every target bounces and settles inputs the same way.

use core::fmt;
use core::time::Duration;

use heapless::Vec as HeaplessVec;

use crate::characteristic::{CharacteristicId, CharacteristicValue, WriteError};
use crate::config::ConfigError;
use crate::input::{Gesture, InputId, InputRole};
use crate::sequencer::TriggerOutcome;
use crate::sequencer::reset::ConfigTarget;
use crate::sync::ApplyOutcome;

use super::grammar::{
    self, Command, ConfigCommand, HelpCommand, HookBehavior, HookCommand, PressCommand,
    WriteCommand,
};

/// Most bounce flips injected on each edge of a press.
pub const MAX_BOUNCE: u32 = 16;
/// Gestures kept per command; further gestures are still handled, just not reported.
pub const GESTURE_LOG_CAPACITY: usize = 8;

pub type GestureLog = HeaplessVec<(InputId, Gesture), GESTURE_LOG_CAPACITY>;

/// Accessory under console control.
pub trait ConsoleTarget {
    /// Whether the running profile binds an input with this role.
    fn has_input(&self, role: InputRole) -> bool;

    /// Polling period of the input bound with `role`.
    fn sample_interval(&self, role: InputRole) -> Duration;

    /// Time for a level change on `role` to be confirmed and classified.
    fn settle_time(&self, role: InputRole) -> Duration;

    /// Holds the simulated button pressed or released from now on.
    fn set_button(&mut self, pressed: bool);

    /// Sets the simulated analog sensor reading from now on.
    fn set_sensor(&mut self, reading: u16);

    /// Lets `by` pass, sampling inputs and ticking activities on the way.
    /// Classified gestures are appended to `gestures` while there is room.
    fn advance(&mut self, by: Duration, gestures: &mut GestureLog);

    /// Accessory-protocol write.
    fn remote_write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> Result<ApplyOutcome, WriteError>;

    fn identify(&mut self) -> TriggerOutcome;

    fn factory_reset(&mut self) -> TriggerOutcome;

    /// Changes one timing option on every bound input.
    fn configure(&mut self, option: &str, value: u32) -> Result<(), ConfigError>;

    /// Scripts the answer of the next config-clear request for `target`.
    fn set_hook(&mut self, target: ConfigTarget, behavior: HookBehavior);
}

/// Command execution successes.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome<'a> {
    Press(PressAck),
    Sensor(SensorAck),
    Write(WriteAck),
    Identify(TriggerOutcome),
    Reset(TriggerOutcome),
    Advance(AdvanceAck),
    Config(ConfigCommand<'a>),
    Hook(HookCommand),
    /// Rendering is left to the caller.
    Status,
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PressAck {
    pub hold: Duration,
    pub bounce: u32,
    pub gestures: GestureLog,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SensorAck {
    pub reading: u16,
    pub gestures: GestureLog,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WriteAck {
    pub characteristic: CharacteristicId,
    pub outcome: ApplyOutcome,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdvanceAck {
    pub elapsed: Duration,
    pub gestures: GestureLog,
}

/// Errors surfaced while executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    Unsupported(&'static str),
    Write(WriteError),
    Config(ConfigError),
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(error) => write!(f, "syntax {error}"),
            CommandError::Unsupported(what) => write!(f, "unsupported {what}"),
            CommandError::Write(error) => write!(f, "write {error}"),
            CommandError::Config(error) => write!(f, "config {error}"),
        }
    }
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl From<WriteError> for CommandError<'_> {
    fn from(error: WriteError) -> Self {
        Self::Write(error)
    }
}

impl From<ConfigError> for CommandError<'_> {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

type CommandResult<'a> = Result<CommandOutcome<'a>, CommandError<'a>>;

/// Dispatches console commands to a target.
pub struct CommandExecutor<T> {
    target: T,
}

impl<T> CommandExecutor<T> {
    pub const fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_inner(self) -> T {
        self.target
    }
}

impl<T> CommandExecutor<T>
where
    T: ConsoleTarget,
{
    /// Parses and executes a console command.
    pub fn execute<'a>(&mut self, line: &'a str) -> CommandResult<'a> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> CommandResult<'a> {
        match command {
            Command::Press(press) => self.handle_press(&press).map(CommandOutcome::Press),
            Command::Sensor(reading) => self.handle_sensor(reading).map(CommandOutcome::Sensor),
            Command::Write(write) => self.handle_write(write).map(CommandOutcome::Write),
            Command::Identify => Ok(CommandOutcome::Identify(self.target.identify())),
            Command::Reset => Ok(CommandOutcome::Reset(self.target.factory_reset())),
            Command::Advance(elapsed) => {
                let mut gestures = GestureLog::new();
                self.target.advance(elapsed, &mut gestures);
                Ok(CommandOutcome::Advance(AdvanceAck { elapsed, gestures }))
            }
            Command::Config(config) => {
                self.target.configure(config.option, config.value)?;
                Ok(CommandOutcome::Config(config))
            }
            Command::Hook(hook) => {
                self.target.set_hook(hook.target, hook.behavior);
                Ok(CommandOutcome::Hook(hook))
            }
            Command::Status => Ok(CommandOutcome::Status),
            Command::Help(help) => Ok(CommandOutcome::Help(help)),
        }
    }

    fn handle_press(&mut self, press: &PressCommand) -> Result<PressAck, CommandError<'static>> {
        if !self.target.has_input(InputRole::Button) {
            return Err(CommandError::Unsupported("press: profile has no button"));
        }
        let bounce = press.bounce.unwrap_or(0);
        if bounce > MAX_BOUNCE {
            return Err(CommandError::Unsupported("press: bounce must be 0-16"));
        }

        let mut gestures = GestureLog::new();
        let flip = self.target.sample_interval(InputRole::Button);

        self.chatter(true, bounce, flip, &mut gestures);
        self.target.set_button(true);
        self.target.advance(press.hold, &mut gestures);

        self.chatter(false, bounce, flip, &mut gestures);
        self.target.set_button(false);
        let settle = self.target.settle_time(InputRole::Button);
        self.target.advance(settle, &mut gestures);

        Ok(PressAck {
            hold: press.hold,
            bounce,
            gestures,
        })
    }

    /// Alternates the button around a transition to `pressed`, one sample per level.
    fn chatter(&mut self, pressed: bool, count: u32, flip: Duration, gestures: &mut GestureLog) {
        for _ in 0..count {
            self.target.set_button(pressed);
            self.target.advance(flip, gestures);
            self.target.set_button(!pressed);
            self.target.advance(flip, gestures);
        }
    }

    fn handle_sensor(&mut self, reading: u16) -> Result<SensorAck, CommandError<'static>> {
        if !self.target.has_input(InputRole::BinarySensor) {
            return Err(CommandError::Unsupported("sensor: profile has no sensor"));
        }
        let mut gestures = GestureLog::new();
        self.target.set_sensor(reading);
        let settle = self.target.settle_time(InputRole::BinarySensor);
        self.target.advance(settle, &mut gestures);
        Ok(SensorAck { reading, gestures })
    }

    fn handle_write(&mut self, write: WriteCommand) -> Result<WriteAck, CommandError<'static>> {
        let outcome = self
            .target
            .remote_write(write.characteristic, write.value.to_value())?;
        Ok(WriteAck {
            characteristic: write.characteristic,
            outcome,
        })
    }
}
