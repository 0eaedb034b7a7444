use accessory_core::sequencer::ResetStage;
use accessory_core::telemetry::EventId;
use embassy_futures::select::select;
use embassy_time::{Duration, Ticker};

use crate::clock::FirmwareInstant;
use crate::log::{log_reset_stage, log_telemetry};

use super::{ACTIVITY_KICK, SharedAccessory};

/// Blink steps are 100 ms or longer; 10 ms keeps edges within one tick.
const ACTIVITY_TICK: Duration = Duration::from_millis(10);

/// Advances identify and factory reset, then drains new telemetry to the log.
#[embassy_executor::task]
pub async fn run(accessory: &'static SharedAccessory) -> ! {
    let mut ticker = Ticker::every(ACTIVITY_TICK);
    let mut cursor: Option<EventId> = None;
    let mut stage = ResetStage::Idle;
    loop {
        select(ticker.next(), ACTIVITY_KICK.wait()).await;
        let now = FirmwareInstant::now();
        accessory.lock(|cell| {
            let mut accessory = cell.borrow_mut();
            accessory.tick(now);
            if accessory.reset().stage() != stage {
                stage = accessory.reset().stage();
                log_reset_stage(stage, now);
            }
            for record in accessory.telemetry().records_after(cursor) {
                log_telemetry(record);
                cursor = Some(record.id);
            }
        });
    }
}
