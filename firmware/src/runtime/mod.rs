use core::cell::RefCell;

use accessory_core::accessory::{Accessory, Platform};
use accessory_core::input::InputId;
use accessory_core::outputs::OutputBank;
use accessory_core::sequencer::ResetHooks;
use accessory_core::sequencer::reset::ConfigTarget;
use accessory_core::sync::Synchronizer;
use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use crate::clock::FirmwareInstant;
use crate::hw::{BoardInput, ContactSensorAdc, GpioOutputs};
use crate::log::{log_boot, log_setup_failed};
use crate::platform::{
    ChannelNotifier, ClearRequestQueue, ClearStates, NotificationQueue, ProtocolClearHook,
    ProtocolQueue, SystemRestart,
};
use crate::profile::{PROFILE, mac_from_uid};

mod activity_task;
mod notify_task;
mod protocol_task;
mod sample_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub struct FirmwarePlatform;

impl Platform for FirmwarePlatform {
    type Instant = FirmwareInstant;
    type Outputs = GpioOutputs<'static>;
    type Notifier = ChannelNotifier;
    type NetworkReset = ProtocolClearHook;
    type AccessoryReset = ProtocolClearHook;
    type Restart = SystemRestart;
}

pub type SharedAccessory = Mutex<ThreadModeRawMutex, RefCell<Accessory<FirmwarePlatform>>>;

static ACCESSORY: StaticCell<SharedAccessory> = StaticCell::new();
pub(super) static NOTIFICATIONS: NotificationQueue = Channel::new();
/// Intake for the accessory-protocol stack: remote writes and clear acknowledgements.
pub static PROTOCOL_EVENTS: ProtocolQueue = Channel::new();
/// Outbound clear requests; the protocol stack answers with `ProtocolEvent::ClearAcknowledged`.
pub static CLEAR_REQUESTS: ClearRequestQueue = Channel::new();
pub(super) static CLEAR_STATES: ClearStates = ClearStates::new();
/// Wakes the activity task as soon as a gesture or remote write may have started one.
pub(super) static ACTIVITY_KICK: Signal<ThreadModeRawMutex, ()> = Signal::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA5,
        PB4,
        PC13,
        ADC1,
        ..
    } = hal::init(config);

    let outputs = GpioOutputs::new(
        Output::new(PB4, Level::Low, Speed::Low),
        Output::new(PA5, Level::High, Speed::Low),
    );
    let sync = Synchronizer::new(
        OutputBank::new(outputs),
        ChannelNotifier::new(NOTIFICATIONS.sender()),
    );
    let hooks = ResetHooks::new(
        ProtocolClearHook::new(
            ConfigTarget::Network,
            &CLEAR_STATES.network,
            CLEAR_REQUESTS.sender(),
        ),
        ProtocolClearHook::new(
            ConfigTarget::Accessory,
            &CLEAR_STATES.accessory,
            CLEAR_REQUESTS.sender(),
        ),
        SystemRestart,
    );
    let mac = mac_from_uid(hal::uid::uid());

    let accessory = match Accessory::new(PROFILE, mac, sync, hooks, FirmwareInstant::now()) {
        Ok(accessory) => accessory,
        Err(error) => {
            log_setup_failed(error);
            core::future::pending::<()>().await;
            return;
        }
    };
    if let Some(name) = accessory.name() {
        log_boot(PROFILE, name.as_str());
    }
    let accessory: &'static SharedAccessory = ACCESSORY.init(Mutex::new(RefCell::new(accessory)));

    let mut button = Some(PC13);
    let mut contact = Some((ADC1, PA0));
    for binding in PROFILE.inputs {
        let input = match binding.input {
            InputId::Button => button
                .take()
                .map(|pin| BoardInput::Button(Input::new(pin, Pull::Up))),
            InputId::ContactSensor => contact.take().map(|(adc, pin)| {
                BoardInput::ContactSensor(ContactSensorAdc::new(Adc::new(adc), pin.degrade_adc()))
            }),
        };
        let Some(input) = input else {
            continue;
        };
        spawner
            .spawn(sample_task::run(accessory, input, binding.config.sample_interval))
            .expect("failed to spawn input sampling task");
    }

    spawner
        .spawn(activity_task::run(accessory))
        .expect("failed to spawn activity task");

    spawner
        .spawn(notify_task::run(NOTIFICATIONS.receiver()))
        .expect("failed to spawn notification task");

    spawner
        .spawn(protocol_task::run(accessory, PROTOCOL_EVENTS.receiver()))
        .expect("failed to spawn protocol intake task");

    core::future::pending::<()>().await;
}
