//! Single-item mailbox carrying a response from the callback context to the waiting command.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::gatt::response::GattResponse;

#[derive(Debug, Default)]
struct SlotState {
    armed: bool,
    pending: Option<GattResponse>,
}

/// Overwrite-on-deliver mailbox holding at most one response.
///
/// The slot only accepts responses while a command is in flight. A response delivered after
/// submission but before the command starts waiting is kept for the next `receive`.
#[derive(Debug, Default)]
pub(crate) struct CorrelationSlot {
    state: Mutex<SlotState>,
    notify: Notify,
}

impl CorrelationSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Open the slot for one round trip, discarding anything left over from earlier commands.
    pub(crate) fn arm(&self) -> ArmedSlot<'_> {
        let mut state = self.state.lock();
        state.armed = true;
        if let Some(stale) = state.pending.take() {
            debug!("Discarding stale {} response", stale.kind());
        }
        ArmedSlot { slot: self }
    }

    /// Hand a response to the waiting command, replacing any undelivered one.
    pub(crate) fn deliver(&self, response: GattResponse) {
        {
            let mut state = self.state.lock();
            if !state.armed {
                debug!(
                    "No command in flight, dropping {} response (status {})",
                    response.kind(),
                    response.status()
                );
                return;
            }
            if let Some(previous) = state.pending.replace(response) {
                debug!("Overwriting undelivered {} response", previous.kind());
            }
        }
        self.notify.notify_one();
    }

    /// Wait for the next response.
    pub(crate) async fn receive(&self) -> GattResponse {
        loop {
            let notified = self.notify.notified();
            if let Some(response) = self.state.lock().pending.take() {
                return response;
            }
            notified.await;
        }
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

/// Keeps the slot open until dropped, including when the waiting command is cancelled.
pub(crate) struct ArmedSlot<'a> {
    slot: &'a CorrelationSlot,
}

impl Drop for ArmedSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        state.armed = false;
        state.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::types::GattStatus;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn rssi(value: i16) -> GattResponse {
        GattResponse::RssiRead {
            status: GattStatus::SUCCESS,
            rssi: value,
        }
    }

    #[tokio::test]
    async fn test_delivery_before_receive_is_kept() {
        let slot = CorrelationSlot::new();
        let _armed = slot.arm();

        slot.deliver(rssi(-40));
        assert_eq!(slot.receive().await, rssi(-40));
    }

    #[tokio::test]
    async fn test_latest_delivery_wins() {
        let slot = CorrelationSlot::new();
        let _armed = slot.arm();

        slot.deliver(rssi(-40));
        slot.deliver(rssi(-50));
        assert_eq!(slot.receive().await, rssi(-50));
    }

    #[tokio::test]
    async fn test_disarmed_slot_drops_delivery() {
        let slot = CorrelationSlot::new();
        slot.deliver(rssi(-40));
        assert!(!slot.has_pending());

        {
            let _armed = slot.arm();
            slot.deliver(rssi(-41));
            assert!(slot.has_pending());
        }
        assert!(!slot.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_wakes_on_delivery() {
        let slot = Arc::new(CorrelationSlot::new());
        let armed = slot.arm();

        let sender = slot.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sender.deliver(rssi(-70));
        });

        assert_eq!(slot.receive().await, rssi(-70));
        drop(armed);
    }
}
