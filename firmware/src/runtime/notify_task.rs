use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Receiver;

use crate::log::log_notification;
use crate::platform::{NOTIFICATION_QUEUE_DEPTH, Notification};

/// Logs change notifications. Stand-in consumer of the queue; an
/// accessory-protocol stack takes over the receiver in its place.
#[embassy_executor::task]
pub async fn run(
    receiver: Receiver<'static, ThreadModeRawMutex, Notification, NOTIFICATION_QUEUE_DEPTH>,
) -> ! {
    loop {
        let notification = receiver.receive().await;
        log_notification(&notification);
    }
}
