use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Receiver;

use crate::clock::FirmwareInstant;
use crate::log::{log_clear_acknowledged, log_remote_write};
use crate::platform::{PROTOCOL_QUEUE_DEPTH, ProtocolEvent};

use super::{ACTIVITY_KICK, CLEAR_STATES, SharedAccessory};

#[embassy_executor::task]
pub async fn run(
    accessory: &'static SharedAccessory,
    receiver: Receiver<'static, ThreadModeRawMutex, ProtocolEvent, PROTOCOL_QUEUE_DEPTH>,
) -> ! {
    loop {
        match receiver.receive().await {
            ProtocolEvent::Write { id, value } => {
                let now = FirmwareInstant::now();
                let result =
                    accessory.lock(|cell| cell.borrow_mut().remote_write(id, value, now));
                log_remote_write(id, &result);
                ACTIVITY_KICK.signal(());
            }
            ProtocolEvent::ClearAcknowledged(target) => {
                let accepted = CLEAR_STATES.get(target).acknowledge();
                log_clear_acknowledged(target, accepted);
                ACTIVITY_KICK.signal(());
            }
        }
    }
}
