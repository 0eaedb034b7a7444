use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use accessory_core::accessory::{Accessory, AccessoryProfile, MAX_INPUTS, Platform, ProfileKind};
use accessory_core::characteristic::{
    CharacteristicId, CharacteristicValue, Generation, WriteError,
};
use accessory_core::clock::MicrosInstant;
use accessory_core::config::ConfigError;
use accessory_core::console::catalog;
use accessory_core::console::commands::{
    CommandExecutor, CommandOutcome, ConsoleTarget, GestureLog,
};
use accessory_core::console::grammar::{HelpCommand, HookBehavior};
use accessory_core::input::{Gesture, InputChannel, InputId, InputRole, Level, RawSample};
use accessory_core::outputs::{ALL_OUTPUTS, OUTPUT_COUNT, OutputBank, OutputId, OutputOwner, OutputSink};
use accessory_core::sequencer::reset::{
    ClearAck, ConfigClearError, ConfigResetHook, ConfigTarget, RestartHook,
};
use accessory_core::sequencer::{ResetHooks, TriggerOutcome};
use accessory_core::sync::{ApplyOutcome, Notifier, Synchronizer};
use accessory_core::telemetry::EventId;

/// Locally administered address used for the name suffix.
pub const BENCH_MAC: [u8; 6] = [0x02, 0x00, 0x5E, 0x10, 0x20, 0x30];
/// Period of the activity tick, as on the firmware.
const ACTIVITY_TICK: Duration = Duration::from_millis(10);
/// Sensor reading meaning "contact open" at power-up.
const SENSOR_FULL_SCALE: u16 = 1023;

/// Command help derived from the console catalog.
pub fn help_topics() -> impl Iterator<Item = (&'static str, String)> {
    catalog::commands().iter().map(|command| {
        (
            command.name,
            format!("{:<44} - {}", command.usage, command.summary),
        )
    })
}

/// Timing override passed with `--set key=value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionOverride {
    pub name: String,
    pub value: u32,
}

impl OptionOverride {
    pub fn parse(assignment: &str) -> Result<Self, String> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got `{assignment}`"))?;
        let value = value
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid value in `{assignment}`"))?;
        Ok(Self {
            name: name.trim().to_string(),
            value,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: CharacteristicId,
    pub value: CharacteristicValue,
    pub generation: Generation,
}

/// Queues notifications until the session prints them.
#[derive(Default)]
pub struct NotificationLog {
    pending: Vec<Notification>,
    total: usize,
}

impl Notifier for NotificationLog {
    fn notify(&mut self, id: CharacteristicId, value: &CharacteristicValue, generation: Generation) {
        self.total += 1;
        self.pending.push(Notification {
            id,
            value: value.clone(),
            generation,
        });
    }
}

/// Remembers the last level written to each pin.
#[derive(Default)]
pub struct HostOutputs {
    levels: [Option<Level>; OUTPUT_COUNT],
}

impl HostOutputs {
    pub fn level(&self, pin: OutputId) -> Option<Level> {
        self.levels[pin.as_index()]
    }
}

impl OutputSink for HostOutputs {
    fn set_output(&mut self, pin: OutputId, level: Level) {
        self.levels[pin.as_index()] = Some(level);
    }
}

/// Config-clear hook answering as scripted by the `hook` command.
pub struct ScriptedHook {
    behavior: HookBehavior,
    calls: u32,
}

impl ScriptedHook {
    pub const fn new() -> Self {
        Self {
            behavior: HookBehavior::Confirm,
            calls: 0,
        }
    }

    pub const fn behavior(&self) -> HookBehavior {
        self.behavior
    }

    pub const fn calls(&self) -> u32 {
        self.calls
    }
}

impl ConfigResetHook for ScriptedHook {
    fn clear(&mut self) -> Result<ClearAck, ConfigClearError> {
        self.calls += 1;
        match self.behavior {
            HookBehavior::Confirm => Ok(ClearAck::Confirmed),
            HookBehavior::Fail => Err(ConfigClearError::Storage),
            HookBehavior::Busy => Err(ConfigClearError::Busy),
            HookBehavior::Pending => Ok(ClearAck::Pending),
        }
    }

    // A pending clear is never confirmed, so the stage runs into its timeout.
    fn poll_cleared(&mut self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct RestartCounter {
    count: u32,
}

impl RestartCounter {
    pub const fn count(&self) -> u32 {
        self.count
    }
}

impl RestartHook for RestartCounter {
    fn restart(&mut self) {
        self.count += 1;
    }
}

pub struct HostPlatform;

impl Platform for HostPlatform {
    type Instant = MicrosInstant;
    type Outputs = HostOutputs;
    type Notifier = NotificationLog;
    type NetworkReset = ScriptedHook;
    type AccessoryReset = ScriptedHook;
    type Restart = RestartCounter;
}

/// Virtual-clock test bench around one accessory.
pub struct Bench {
    accessory: Accessory<HostPlatform>,
    now: MicrosInstant,
    button_pressed: bool,
    sensor_reading: u16,
    next_sample: [Option<MicrosInstant>; MAX_INPUTS],
    next_tick: MicrosInstant,
}

impl Bench {
    pub fn new(profile: &'static AccessoryProfile) -> Result<Self, String> {
        let sync = Synchronizer::new(
            OutputBank::new(HostOutputs::default()),
            NotificationLog::default(),
        );
        let hooks = ResetHooks::new(
            ScriptedHook::new(),
            ScriptedHook::new(),
            RestartCounter::default(),
        );
        let accessory = Accessory::new(profile, BENCH_MAC, sync, hooks, MicrosInstant::ZERO)
            .map_err(|err| format!("accessory setup failed: {err}"))?;

        let mut next_sample = [None; MAX_INPUTS];
        let mut sensor_reading = 0;
        for (slot, channel) in next_sample.iter_mut().zip(accessory.inputs()) {
            *slot = Some(MicrosInstant::ZERO + channel.sample_interval());
            if channel.role() == InputRole::BinarySensor
                && channel.polarity().idle_level() == Level::High
            {
                sensor_reading = SENSOR_FULL_SCALE;
            }
        }

        Ok(Self {
            accessory,
            now: MicrosInstant::ZERO,
            button_pressed: false,
            sensor_reading,
            next_sample,
            next_tick: MicrosInstant::ZERO + ACTIVITY_TICK,
        })
    }

    pub const fn now(&self) -> MicrosInstant {
        self.now
    }

    pub fn accessory(&self) -> &Accessory<HostPlatform> {
        &self.accessory
    }

    pub fn restarts(&self) -> u32 {
        self.accessory.hooks().restart.count()
    }

    pub fn notifications_sent(&self) -> usize {
        self.accessory.synchronizer().notifier().total
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.accessory.synchronizer_mut().notifier_mut().pending)
    }

    pub fn output_level(&self, pin: OutputId) -> Option<Level> {
        self.accessory.synchronizer().outputs().sink().level(pin)
    }

    fn sample(&mut self, index: usize) -> Option<(InputId, Gesture)> {
        let channel = self.accessory.inputs().get(index)?;
        let id = channel.id();
        let sample = match channel.role() {
            InputRole::Button => {
                RawSample::digital(self.now, channel.polarity().level_for(self.button_pressed))
            }
            InputRole::BinarySensor => RawSample::analog(self.now, self.sensor_reading),
        };
        let interval = channel.sample_interval();
        self.next_sample[index] = Some(self.now + interval);
        self.accessory
            .on_sample(id, Ok(sample), self.now)
            .map(|gesture| (id, gesture))
    }

    fn next_event(&self) -> MicrosInstant {
        self.next_sample
            .iter()
            .flatten()
            .copied()
            .fold(self.next_tick, MicrosInstant::min)
    }
}

impl ConsoleTarget for Bench {
    fn has_input(&self, role: InputRole) -> bool {
        self.accessory.inputs().iter().any(|channel| channel.role() == role)
    }

    fn sample_interval(&self, role: InputRole) -> Duration {
        self.accessory
            .inputs()
            .iter()
            .find(|channel| channel.role() == role)
            .map_or(ACTIVITY_TICK, InputChannel::sample_interval)
    }

    fn settle_time(&self, role: InputRole) -> Duration {
        self.accessory
            .inputs()
            .iter()
            .find(|channel| channel.role() == role)
            .map_or(Duration::ZERO, |channel| {
                channel.config().debounce + channel.sample_interval() * 2
            })
    }

    fn set_button(&mut self, pressed: bool) {
        self.button_pressed = pressed;
    }

    fn set_sensor(&mut self, reading: u16) {
        self.sensor_reading = reading;
    }

    fn advance(&mut self, by: Duration, gestures: &mut GestureLog) {
        let end = self.now + by;
        loop {
            let next = self.next_event();
            if next > end {
                break;
            }
            self.now = next;
            for index in 0..MAX_INPUTS {
                if !self.next_sample[index].is_some_and(|due| due <= self.now) {
                    continue;
                }
                if let Some(gesture) = self.sample(index) {
                    let _ = gestures.push(gesture);
                }
            }
            if self.next_tick <= self.now {
                self.accessory.tick(self.now);
                self.next_tick = self.now + ACTIVITY_TICK;
            }
        }
        self.now = end;
    }

    fn remote_write(
        &mut self,
        id: CharacteristicId,
        value: CharacteristicValue,
    ) -> Result<ApplyOutcome, WriteError> {
        self.accessory.remote_write(id, value, self.now)
    }

    fn identify(&mut self) -> TriggerOutcome {
        self.accessory.trigger_identify(self.now)
    }

    fn factory_reset(&mut self) -> TriggerOutcome {
        self.accessory.trigger_reset(self.now)
    }

    fn configure(&mut self, option: &str, value: u32) -> Result<(), ConfigError> {
        let inputs: Vec<_> = self
            .accessory
            .inputs()
            .iter()
            .map(|channel| (channel.id(), channel.config()))
            .collect();
        if inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        for (id, mut config) in inputs {
            config.set_option(option, value)?;
            self.accessory.reconfigure_input(id, config)?;
        }
        Ok(())
    }

    fn set_hook(&mut self, target: ConfigTarget, behavior: HookBehavior) {
        let hooks = self.accessory.hooks_mut();
        match target {
            ConfigTarget::Network => hooks.network.behavior = behavior,
            ConfigTarget::Accessory => hooks.accessory.behavior = behavior,
        }
    }
}

pub struct Session {
    executor: CommandExecutor<Bench>,
    transcript: TranscriptLogger,
    telemetry_cursor: Option<EventId>,
    restarts_reported: u32,
}

impl Session {
    pub fn new(
        kind: ProfileKind,
        overrides: &[OptionOverride],
        transcript_path: &Path,
    ) -> io::Result<Self> {
        let mut bench = Bench::new(kind.profile()).map_err(io::Error::other)?;
        for option in overrides {
            bench
                .configure(&option.name, option.value)
                .map_err(|err| io::Error::other(format!("--set {}: {err}", option.name)))?;
        }
        let transcript = TranscriptLogger::new(transcript_path, kind)?;

        let mut session = Self {
            executor: CommandExecutor::new(bench),
            transcript,
            telemetry_cursor: None,
            restarts_reported: 0,
        };
        let boot = session.collect_events();
        session.record_output(&boot)?;
        Ok(session)
    }

    pub fn bench(&self) -> &Bench {
        self.executor.target()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = match self.executor.execute(trimmed) {
            Ok(outcome) => describe_outcome(&outcome, self.executor.target()),
            Err(err) => vec![format!("ERR {err}")],
        };
        lines.extend(self.collect_events());

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn elapsed(&self) -> Duration {
        Duration::from_micros(self.bench().now().as_micros())
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let elapsed = self.elapsed();
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }

    /// Telemetry, notifications and restarts produced since the last call.
    fn collect_events(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let bench = self.executor.target();
        let mut cursor = self.telemetry_cursor;
        for record in bench.accessory().telemetry().records_after(cursor) {
            lines.push(format!(
                "  [+{}ms] {} {}",
                record.timestamp.as_millis(),
                record.event,
                record.details
            ));
            cursor = Some(record.id);
        }
        self.telemetry_cursor = cursor;

        let restarts = bench.restarts();
        let bench = self.executor.target_mut();
        for notification in bench.take_notifications() {
            lines.push(format!(
                "NOTIFY {}={} {}",
                notification.id, notification.value, notification.generation
            ));
        }
        if restarts > self.restarts_reported {
            lines.push(format!("RESTART requested (total {restarts})"));
            self.restarts_reported = restarts;
        }
        lines
    }
}

fn describe_outcome(outcome: &CommandOutcome<'_>, bench: &Bench) -> Vec<String> {
    match outcome {
        CommandOutcome::Press(ack) => vec![format!(
            "OK press hold={} bounce={} gestures={}",
            format_duration_short(ack.hold),
            ack.bounce,
            describe_gestures(&ack.gestures)
        )],
        CommandOutcome::Sensor(ack) => vec![format!(
            "OK sensor reading={} gestures={}",
            ack.reading,
            describe_gestures(&ack.gestures)
        )],
        CommandOutcome::Write(ack) => match ack.outcome {
            ApplyOutcome::Changed(generation) => {
                vec![format!("OK write {} changed {generation}", ack.characteristic)]
            }
            ApplyOutcome::Unchanged => vec![format!("OK write {} unchanged", ack.characteristic)],
        },
        CommandOutcome::Identify(outcome) => vec![describe_trigger("identify", *outcome)],
        CommandOutcome::Reset(outcome) => vec![describe_trigger("reset", *outcome)],
        CommandOutcome::Advance(ack) => vec![format!(
            "OK advance {} gestures={}",
            format_duration_short(ack.elapsed),
            describe_gestures(&ack.gestures)
        )],
        CommandOutcome::Config(config) => {
            vec![format!("OK config {}={}", config.option, config.value)]
        }
        CommandOutcome::Hook(hook) => vec![format!("OK hook {} {}", hook.target, hook.behavior)],
        CommandOutcome::Status => describe_status(bench),
        CommandOutcome::Help(help) => describe_help(help),
    }
}

fn describe_trigger(label: &str, outcome: TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Started => format!("OK {label} started"),
        TriggerOutcome::Ignored => format!("OK {label} ignored (already running)"),
        TriggerOutcome::Blocked(err) => format!("ERR {label} blocked: {err}"),
    }
}

fn describe_gestures(gestures: &GestureLog) -> String {
    if gestures.is_empty() {
        return "none".to_string();
    }
    gestures
        .iter()
        .map(|(input, gesture)| format!("{input}:{gesture}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn describe_status(bench: &Bench) -> Vec<String> {
    let accessory = bench.accessory();
    let mut lines = vec![format!(
        "OK status profile={} t=+{}ms",
        accessory.profile().kind,
        bench.now().as_millis()
    )];

    for characteristic in accessory.synchronizer().iter() {
        lines.push(format!(
            "  {}={} {}",
            characteristic.id(),
            characteristic.value(),
            characteristic.generation()
        ));
    }

    let outputs = accessory.synchronizer().outputs();
    for line in ALL_OUTPUTS {
        let level = bench
            .output_level(line.id)
            .map_or_else(|| "unset".to_string(), |level| level.to_string());
        let holder = match outputs.holder(line.id) {
            Some(OutputOwner::Identify) => "identify",
            Some(OutputOwner::ResetFeedback) => "reset",
            None => "-",
        };
        lines.push(format!(
            "  output {} ({}) level={level} holder={holder}",
            line.name, line.mcu_pin
        ));
    }

    for channel in accessory.inputs() {
        lines.push(format!(
            "  input {} level={} every={}",
            channel.id(),
            channel.stable_level(),
            format_duration_short(channel.sample_interval())
        ));
    }

    let hooks = accessory.hooks();
    lines.push(format!(
        "  identify={} reset={} restarts={} notifications={}",
        accessory.identify().state(),
        accessory.reset().stage(),
        bench.restarts(),
        bench.notifications_sent()
    ));
    lines.push(format!(
        "  hooks network={} ({} calls) accessory={} ({} calls)",
        hooks.network.behavior(),
        hooks.network.calls(),
        hooks.accessory.behavior(),
        hooks.accessory.calls()
    ));
    lines
}

fn describe_help(help: &HelpCommand<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    match help.topic {
        Some(topic) => {
            if let Some((_, detail)) =
                help_topics().find(|(name, _)| name.eq_ignore_ascii_case(topic))
            {
                lines.push(detail);
            } else {
                lines.push(format!("No help available for `{topic}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in help_topics() {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn help_topic_list() -> String {
    help_topics()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

/// Default transcript location for a profile.
pub fn transcript_path(kind: ProfileKind) -> PathBuf {
    PathBuf::from(format!("transcripts/emulator-{}.log", kind.name()))
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path, kind: ProfileKind) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(kind)?;
        Ok(logger)
    }

    fn write_header(&mut self, kind: ProfileKind) -> io::Result<()> {
        writeln!(self.writer, "# Accessory emulator transcript ({kind} profile)")?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since power-up"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
