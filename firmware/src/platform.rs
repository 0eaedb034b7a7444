//! Collaborators handed to the accessory core: notification queue,
//! configuration-clear hooks and the MCU restart.

use accessory_core::characteristic::{CharacteristicId, CharacteristicValue, Generation};
use accessory_core::sequencer::reset::{
    ClearAck, ConfigClearError, ConfigResetHook, ConfigTarget, RestartHook,
};
use accessory_core::sync::Notifier;
use embassy_sync::channel::{Channel, Sender, TrySendError};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::log::{log_clear_requested, log_notification_dropped, log_restart};

#[cfg(target_os = "none")]
pub type AccessoryMutex = embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type AccessoryMutex = embassy_sync::blocking_mutex::raw::NoopRawMutex;

pub const NOTIFICATION_QUEUE_DEPTH: usize = 8;
pub const PROTOCOL_QUEUE_DEPTH: usize = 4;
/// One slot per store; a store is never asked twice before it answers.
pub const CLEAR_REQUEST_QUEUE_DEPTH: usize = 2;

/// Change event forwarded to the accessory-protocol stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: CharacteristicId,
    pub value: CharacteristicValue,
    pub generation: Generation,
}

/// Requests arriving from the accessory-protocol stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolEvent {
    Write {
        id: CharacteristicId,
        value: CharacteristicValue,
    },
    /// The stack finished erasing a store it was asked to clear.
    ClearAcknowledged(ConfigTarget),
}

pub type NotificationQueue = Channel<AccessoryMutex, Notification, NOTIFICATION_QUEUE_DEPTH>;
pub type ProtocolQueue = Channel<AccessoryMutex, ProtocolEvent, PROTOCOL_QUEUE_DEPTH>;
pub type ClearRequestQueue = Channel<AccessoryMutex, ConfigTarget, CLEAR_REQUEST_QUEUE_DEPTH>;
pub type ClearRequestSender =
    Sender<'static, AccessoryMutex, ConfigTarget, CLEAR_REQUEST_QUEUE_DEPTH>;

/// Notifications lost because the queue was full.
pub static DROPPED_NOTIFICATIONS: AtomicU32 = AtomicU32::new(0);

/// Publishes change notifications without blocking the caller.
pub struct ChannelNotifier {
    sender: Sender<'static, AccessoryMutex, Notification, NOTIFICATION_QUEUE_DEPTH>,
}

impl ChannelNotifier {
    pub const fn new(
        sender: Sender<'static, AccessoryMutex, Notification, NOTIFICATION_QUEUE_DEPTH>,
    ) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&mut self, id: CharacteristicId, value: &CharacteristicValue, generation: Generation) {
        let notification = Notification {
            id,
            value: value.clone(),
            generation,
        };
        if let Err(TrySendError::Full(_)) = self.sender.try_send(notification) {
            let dropped = DROPPED_NOTIFICATIONS.fetch_add(1, Ordering::Relaxed) + 1;
            log_notification_dropped(id, dropped);
        }
    }
}

/// Handshake flags for one persistent store.
pub struct ClearState {
    requested: AtomicBool,
    cleared: AtomicBool,
}

impl ClearState {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            cleared: AtomicBool::new(false),
        }
    }

    /// Marks the store cleared. Acknowledgements without an outstanding
    /// request are ignored.
    pub fn acknowledge(&self) -> bool {
        if self.requested.swap(false, Ordering::AcqRel) {
            self.cleared.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

pub struct ClearStates {
    pub network: ClearState,
    pub accessory: ClearState,
}

impl ClearStates {
    pub const fn new() -> Self {
        Self {
            network: ClearState::new(),
            accessory: ClearState::new(),
        }
    }

    pub const fn get(&self, target: ConfigTarget) -> &ClearState {
        match target {
            ConfigTarget::Network => &self.network,
            ConfigTarget::Accessory => &self.accessory,
        }
    }
}

/// Asks the protocol stack to erase a store and waits for its acknowledgement.
pub struct ProtocolClearHook {
    target: ConfigTarget,
    state: &'static ClearState,
    requests: ClearRequestSender,
}

impl ProtocolClearHook {
    pub const fn new(
        target: ConfigTarget,
        state: &'static ClearState,
        requests: ClearRequestSender,
    ) -> Self {
        Self {
            target,
            state,
            requests,
        }
    }
}

impl ConfigResetHook for ProtocolClearHook {
    fn clear(&mut self) -> Result<ClearAck, ConfigClearError> {
        if self.state.is_requested() {
            return Err(ConfigClearError::Busy);
        }
        self.state.cleared.store(false, Ordering::Release);
        self.state.requested.store(true, Ordering::Release);

        // Nobody drains the queue when no protocol stack is linked in.
        let queued = self.requests.try_send(self.target).is_ok();
        log_clear_requested(self.target, queued);
        if queued {
            Ok(ClearAck::Pending)
        } else {
            self.state.requested.store(false, Ordering::Release);
            Err(ConfigClearError::Unavailable)
        }
    }

    fn poll_cleared(&mut self) -> bool {
        self.state.cleared.load(Ordering::Acquire)
    }
}

pub struct SystemRestart;

impl RestartHook for SystemRestart {
    #[cfg(target_os = "none")]
    fn restart(&mut self) {
        log_restart();
        cortex_m::peripheral::SCB::sys_reset();
    }

    #[cfg(not(target_os = "none"))]
    fn restart(&mut self) {
        log_restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NETWORK: ClearState = ClearState::new();
    static STRAY: ClearState = ClearState::new();
    static UNCLAIMED: ClearState = ClearState::new();

    fn request_queue() -> &'static ClearRequestQueue {
        Box::leak(Box::new(Channel::new()))
    }

    #[test]
    fn clear_publishes_one_request_and_waits_for_acknowledgement() {
        let requests = request_queue();
        let mut hook = ProtocolClearHook::new(ConfigTarget::Network, &NETWORK, requests.sender());
        assert_eq!(hook.clear(), Ok(ClearAck::Pending));
        assert!(!hook.poll_cleared());
        assert_eq!(hook.clear(), Err(ConfigClearError::Busy));

        assert_eq!(requests.try_receive().ok(), Some(ConfigTarget::Network));
        assert!(requests.try_receive().is_err());

        assert!(NETWORK.acknowledge());
        assert!(hook.poll_cleared());
    }

    #[test]
    fn stray_acknowledgement_is_ignored() {
        let mut hook =
            ProtocolClearHook::new(ConfigTarget::Accessory, &STRAY, request_queue().sender());
        assert!(!STRAY.acknowledge());
        assert!(!hook.poll_cleared());
    }

    #[test]
    fn full_request_queue_reports_unavailable() {
        let requests = request_queue();
        for _ in 0..CLEAR_REQUEST_QUEUE_DEPTH {
            assert!(requests.try_send(ConfigTarget::Network).is_ok());
        }
        let mut hook =
            ProtocolClearHook::new(ConfigTarget::Accessory, &UNCLAIMED, requests.sender());
        assert_eq!(hook.clear(), Err(ConfigClearError::Unavailable));
        assert!(!UNCLAIMED.is_requested());
        assert!(!UNCLAIMED.acknowledge());
    }

    #[test]
    fn full_queue_counts_dropped_notifications() {
        let queue: &'static NotificationQueue = Box::leak(Box::new(Channel::new()));
        let mut notifier = ChannelNotifier::new(queue.sender());
        let before = DROPPED_NOTIFICATIONS.load(Ordering::Relaxed);
        let mut generation = Generation::INITIAL;
        for _ in 0..=NOTIFICATION_QUEUE_DEPTH {
            generation = generation.next();
            notifier.notify(CharacteristicId::On, &CharacteristicValue::Bool(true), generation);
        }
        assert_eq!(DROPPED_NOTIFICATIONS.load(Ordering::Relaxed), before + 1);

        let first = queue.try_receive().ok();
        assert_eq!(first.map(|n| n.generation), Some(Generation::INITIAL.next()));
    }
}
