//! Bench console command table.
//!
//! The parser walks these nodes to read each command's arguments, and the
//! emulator prints `usage`/`summary` for `help`.

use crate::config::OPTION_NAMES;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Press,
    Sensor,
    Write,
    Identify,
    Reset,
    Advance,
    Config,
    Hook,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueSpec {
    Duration,
    /// Raw ADC reading.
    Reading,
    Characteristic,
    /// `true`/`false`/`on`/`off` or an integer.
    CharacteristicValue,
    /// `<name>=<integer>`.
    Assignment {
        names: &'static [&'static str],
    },
    Keyword {
        keywords: &'static [&'static str],
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    Value {
        value: ValueSpec,
        next: &'static Node,
    },
    /// Optional `<key>=<integer>` suffix.
    OptionalAssignment {
        key: &'static str,
        next: &'static Node,
    },
    Topic {
        next: &'static Node,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub const HOOK_TARGETS: [&str; 2] = ["network", "accessory"];
pub const HOOK_BEHAVIORS: [&str; 4] = ["ok", "fail", "busy", "pending"];

const END: Node = Node::End;

const PRESS_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Duration,
    next: &Node::OptionalAssignment {
        key: "bounce",
        next: &END,
    },
};

const SENSOR_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Reading,
    next: &END,
};

const WRITE_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Characteristic,
    next: &Node::Value {
        value: ValueSpec::CharacteristicValue,
        next: &END,
    },
};

const ADVANCE_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Duration,
    next: &END,
};

const CONFIG_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Assignment {
        names: &OPTION_NAMES,
    },
    next: &END,
};

const HOOK_GRAMMAR: Node = Node::Value {
    value: ValueSpec::Keyword {
        keywords: &HOOK_TARGETS,
    },
    next: &Node::Value {
        value: ValueSpec::Keyword {
            keywords: &HOOK_BEHAVIORS,
        },
        next: &END,
    },
};

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 10] = [
    CommandSpec {
        name: "press",
        tag: CommandTag::Press,
        grammar: &PRESS_GRAMMAR,
        usage: "press <duration> [bounce=<n>]",
        summary: "hold the button, optionally bouncing n times on each edge",
    },
    CommandSpec {
        name: "sensor",
        tag: CommandTag::Sensor,
        grammar: &SENSOR_GRAMMAR,
        usage: "sensor <reading>",
        summary: "set the analog contact sensor reading",
    },
    CommandSpec {
        name: "write",
        tag: CommandTag::Write,
        grammar: &WRITE_GRAMMAR,
        usage: "write <characteristic> <true|false|integer>",
        summary: "remote write through the accessory-protocol entry point",
    },
    CommandSpec {
        name: "identify",
        tag: CommandTag::Identify,
        grammar: &END,
        usage: "identify",
        summary: "start the identify blink pattern",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        grammar: &END,
        usage: "reset",
        summary: "start the factory reset sequence",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        grammar: &ADVANCE_GRAMMAR,
        usage: "advance <duration>",
        summary: "let virtual time pass",
    },
    CommandSpec {
        name: "config",
        tag: CommandTag::Config,
        grammar: &CONFIG_GRAMMAR,
        usage: "config <option>=<integer>",
        summary: "change an input timing option",
    },
    CommandSpec {
        name: "hook",
        tag: CommandTag::Hook,
        grammar: &HOOK_GRAMMAR,
        usage: "hook <network|accessory> <ok|fail|busy|pending>",
        summary: "script the answer of a config-clear hook",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "show characteristics, outputs and activities",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [topic]",
        summary: "show help for a command",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
