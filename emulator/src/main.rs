mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use accessory_core::accessory::ProfileKind;
use session::{OptionOverride, Session, transcript_path};

const USAGE: &str =
    "Usage: accessory-emulator [--profile <switch|contact|fan>] [--set <option>=<value>]...";

struct Options {
    profile: ProfileKind,
    overrides: Vec<OptionOverride>,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let path = transcript_path(options.profile);
    let mut session = Session::new(options.profile, &options.overrides, &path)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Accessory emulator ({} profile) ready. Type `help` for commands or `exit` to quit.",
        options.profile
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_profile(tag: &str) -> Result<ProfileKind, String> {
    ProfileKind::from_name(tag).ok_or_else(|| format!("Unknown accessory profile `{tag}`"))
}

fn parse_options(args: impl IntoIterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        profile: ProfileKind::Switch,
        overrides: Vec::new(),
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            options.profile = parse_profile(value)?;
        } else if arg == "--profile" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --profile".to_string())?;
            options.profile = parse_profile(&value)?;
        } else if let Some(value) = arg.strip_prefix("--set=") {
            options.overrides.push(OptionOverride::parse(value)?);
        } else if arg == "--set" {
            let value = args
                .next()
                .ok_or_else(|| "Expected key=value after --set".to_string())?;
            options.overrides.push(OptionOverride::parse(&value)?);
        } else {
            options.profile = parse_profile(&arg)?;
        }
    }
    Ok(options)
}
