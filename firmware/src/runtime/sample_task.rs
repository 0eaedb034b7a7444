use accessory_core::input::InputSource;
use embassy_time::Ticker;

use crate::clock::{FirmwareInstant, core_duration_to_embassy};
use crate::hw::BoardInput;
use crate::log::log_gesture;

use super::{ACTIVITY_KICK, SharedAccessory};

/// One instance per bound input; profiles bind at most `MAX_INPUTS` (2).
#[embassy_executor::task(pool_size = 2)]
pub async fn run(
    accessory: &'static SharedAccessory,
    mut input: BoardInput<'static>,
    interval: core::time::Duration,
) -> ! {
    let id = input.input();
    let mut ticker = Ticker::every(core_duration_to_embassy(interval));
    loop {
        ticker.next().await;
        let now = FirmwareInstant::now();
        let gesture = accessory.lock(|cell| cell.borrow_mut().poll(&mut input, now));
        if let Some(gesture) = gesture {
            log_gesture(id, gesture, now);
            ACTIVITY_KICK.signal(());
        }
    }
}
