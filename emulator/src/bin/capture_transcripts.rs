use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use accessory_core::accessory::ProfileKind;
use session::{Session, transcript_path};

fn main() -> io::Result<()> {
    for kind in ProfileKind::ALL {
        record_profile(kind)?;
    }
    Ok(())
}

fn record_profile(kind: ProfileKind) -> io::Result<()> {
    let mut session = Session::new(kind, &[], &transcript_path(kind))?;
    match kind {
        ProfileKind::Switch => record_switch(&mut session),
        ProfileKind::ContactSensor => record_contact(&mut session),
        ProfileKind::Fan => record_fan(&mut session),
    }
}

fn record_switch(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("press 150ms")?;
    let _ = session.handle_command("press 120ms bounce=4")?;
    let _ = session.handle_command("write on true")?;
    let _ = session.handle_command("write on true")?;
    let _ = session.handle_command("identify")?;
    let _ = session.handle_command("identify")?;
    let _ = session.handle_command("advance 2s")?;
    let _ = session.handle_command("hook network fail")?;
    let _ = session.handle_command("press 10500ms")?;
    let _ = session.handle_command("advance 5s")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_contact(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("sensor 100")?;
    let _ = session.handle_command("sensor 100")?;
    let _ = session.handle_command("sensor 900")?;
    let _ = session.handle_command("press 150ms")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_fan(session: &mut Session) -> io::Result<()> {
    let _ = session.handle_command("write speed 3")?;
    let _ = session.handle_command("write speed 7")?;
    let _ = session.handle_command("write active 0")?;
    let _ = session.handle_command("hook accessory pending")?;
    let _ = session.handle_command("reset")?;
    let _ = session.handle_command("advance 15s")?;
    let _ = session.handle_command("help write")?;
    Ok(())
}
