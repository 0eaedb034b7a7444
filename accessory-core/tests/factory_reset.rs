use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use accessory_core::accessory::{Accessory, Platform, SWITCH};
use accessory_core::characteristic::{CharacteristicId, CharacteristicValue};
use accessory_core::clock::MicrosInstant;
use accessory_core::input::{Gesture, InputId, Level, RawSample};
use accessory_core::outputs::{NoopOutputSink, OutputBank};
use accessory_core::sequencer::reset::{
    ClearAck, ClearResult, ConfigClearError, ConfigResetHook, RestartHook,
};
use accessory_core::sequencer::{ResetHooks, ResetStage, TriggerOutcome};
use accessory_core::sequences::ResetTiming;
use accessory_core::sync::{NoopNotifier, Synchronizer, WriteOrigin};

type Calls = Rc<RefCell<Vec<&'static str>>>;

#[derive(Clone, Copy)]
enum Script {
    Confirm,
    Fail,
    /// Accepted, never confirmed.
    Hang,
}

struct Hook {
    name: &'static str,
    script: Script,
    calls: Calls,
}

impl ConfigResetHook for Hook {
    fn clear(&mut self) -> Result<ClearAck, ConfigClearError> {
        self.calls.borrow_mut().push(self.name);
        match self.script {
            Script::Confirm => Ok(ClearAck::Confirmed),
            Script::Fail => Err(ConfigClearError::Storage),
            Script::Hang => Ok(ClearAck::Pending),
        }
    }

    fn poll_cleared(&mut self) -> bool {
        !matches!(self.script, Script::Hang)
    }
}

struct Restart {
    calls: Calls,
}

impl RestartHook for Restart {
    fn restart(&mut self) {
        self.calls.borrow_mut().push("restart");
    }
}

struct Bench;

impl Platform for Bench {
    type Instant = MicrosInstant;
    type Outputs = NoopOutputSink;
    type Notifier = NoopNotifier;
    type NetworkReset = Hook;
    type AccessoryReset = Hook;
    type Restart = Restart;
}

const TIMING: ResetTiming = ResetTiming::new(Duration::from_millis(1_000), Duration::from_millis(2_000));

fn at(ms: u64) -> MicrosInstant {
    MicrosInstant::from_millis(ms)
}

fn switch(network: Script) -> (Accessory<Bench>, Calls) {
    let calls = Calls::default();
    let hooks = ResetHooks::new(
        Hook {
            name: "network",
            script: network,
            calls: calls.clone(),
        },
        Hook {
            name: "accessory",
            script: Script::Confirm,
            calls: calls.clone(),
        },
        Restart {
            calls: calls.clone(),
        },
    );
    let accessory = Accessory::with_timing(
        &SWITCH,
        [0x18, 0xfe, 0x34, 0x01, 0x02, 0x03],
        Synchronizer::new(OutputBank::new(NoopOutputSink), NoopNotifier),
        hooks,
        TIMING,
        at(0),
    )
    .expect("switch profile fits");
    (accessory, calls)
}

/// Samples the active-low button every 5 ms while ticking activities every 10 ms.
fn hold_button(accessory: &mut Accessory<Bench>, from: u64, held: u64, until: u64) -> Vec<Gesture> {
    let mut gestures = Vec::new();
    let mut ms = from;
    while ms < until {
        let level = if ms < from + held { Level::Low } else { Level::High };
        let sample = RawSample::digital(at(ms), level);
        gestures.extend(accessory.on_sample(InputId::Button, Ok(sample), at(ms)));
        if ms % 10 == 0 {
            accessory.tick(at(ms));
        }
        ms += 5;
    }
    gestures
}

/// Ticks every 10 ms until restart and returns the stages seen, with the restart time.
fn run_reset(accessory: &mut Accessory<Bench>, calls: &Calls, from: u64) -> (Vec<ResetStage>, u64) {
    let mut stages = vec![accessory.reset().stage()];
    let mut ms = from;
    while !calls.borrow().contains(&"restart") {
        ms += 10;
        assert!(ms < from + 60_000, "reset never restarted");
        accessory.tick(at(ms));
        let stage = accessory.reset().stage();
        if stages.last() != Some(&stage) {
            stages.push(stage);
        }
    }
    (stages, ms)
}

#[test]
fn long_press_resets_in_order_and_restarts_once() {
    let (mut accessory, calls) = switch(Script::Confirm);
    accessory
        .write(CharacteristicId::On, CharacteristicValue::Bool(true), WriteOrigin::Remote, at(0))
        .expect("valid write");

    let gestures = hold_button(&mut accessory, 0, 10_500, 10_600);
    assert_eq!(gestures, vec![Gesture::LongPress]);
    assert!(accessory.reset().is_running());

    let (stages, _) = run_reset(&mut accessory, &calls, 10_600);
    let started = stages
        .iter()
        .position(|stage| *stage == ResetStage::VisualFeedback)
        .expect("feedback stage seen");
    assert_eq!(
        &stages[started..],
        &[
            ResetStage::VisualFeedback,
            ResetStage::ClearNetworkConfig,
            ResetStage::ClearAccessoryConfig,
            ResetStage::Restarting,
        ]
    );
    assert_eq!(*calls.borrow(), vec!["network", "accessory", "restart"]);
    assert_eq!(
        accessory.value(CharacteristicId::On),
        Some(&CharacteristicValue::Bool(false))
    );

    for ms in (11_000..20_000).step_by(10) {
        accessory.tick(at(ms));
    }
    assert_eq!(*calls.borrow(), vec!["network", "accessory", "restart"]);
}

#[test]
fn failed_network_clear_still_restarts_within_bound() {
    let (mut accessory, calls) = switch(Script::Fail);

    assert_eq!(accessory.trigger_reset(at(0)), TriggerOutcome::Started);
    let (_, restarted_at) = run_reset(&mut accessory, &calls, 0);

    assert_eq!(*calls.borrow(), vec!["network", "accessory", "restart"]);
    assert_eq!(
        accessory.reset().report().network,
        ClearResult::Failed(ConfigClearError::Storage)
    );
    assert_eq!(accessory.reset().report().accessory, ClearResult::Confirmed);
    let feedback = 600;
    let bound = feedback + 2 * u64::try_from(TIMING.stage_bound().as_millis()).unwrap_or(u64::MAX);
    assert!(restarted_at <= bound, "restarted at {restarted_at} ms");
}

#[test]
fn unconfirmed_network_clear_times_out() {
    let (mut accessory, calls) = switch(Script::Hang);

    assert_eq!(accessory.trigger_reset(at(0)), TriggerOutcome::Started);
    let (stages, restarted_at) = run_reset(&mut accessory, &calls, 0);

    assert!(stages.contains(&ResetStage::ClearAccessoryConfig));
    assert_eq!(accessory.reset().report().network, ClearResult::TimedOut);
    assert!(restarted_at >= 600 + 2_000);
    assert_eq!(calls.borrow().last(), Some(&"restart"));
}

#[test]
fn second_trigger_is_ignored() {
    let (mut accessory, calls) = switch(Script::Confirm);

    assert_eq!(accessory.trigger_reset(at(0)), TriggerOutcome::Started);
    assert_eq!(accessory.trigger_reset(at(100)), TriggerOutcome::Ignored);
    run_reset(&mut accessory, &calls, 100);

    assert_eq!(calls.borrow().iter().filter(|call| **call == "network").count(), 1);
}
