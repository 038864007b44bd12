//! Fan-out of unsolicited characteristic value notifications.
//!
//! Notifications never pass through the command path. Every subscriber has its own unbounded
//! queue and filters for the characteristic it is interested in.

use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::stream::{FusedStream, Stream, StreamExt};
use parking_lot::Mutex;
use tracing::trace;

use crate::gatt::types::{CharacteristicId, GattCharacteristic};

/// Notification event from a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// The characteristic that changed, carrying the notified value.
    pub characteristic: GattCharacteristic,
    /// When the notification was published on the bus.
    pub received_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Create an event stamped with the current time.
    pub fn new(characteristic: GattCharacteristic) -> Self {
        Self {
            characteristic,
            received_at: Utc::now(),
        }
    }
}

/// Multi-subscriber broadcast of notification events.
#[derive(Debug, Default)]
pub(crate) struct NotificationBus {
    subscribers: Mutex<Vec<UnboundedSender<NotificationEvent>>>,
    enabled: Mutex<HashSet<CharacteristicId>>,
}

impl NotificationBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Publish a notification to every live subscriber.
    pub(crate) fn publish(&self, characteristic: GattCharacteristic) {
        let event = NotificationEvent::new(characteristic);
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.unbounded_send(event.clone()).is_ok());

        trace!(
            "Notification from {}: {} bytes, {} subscribers",
            event.characteristic.uuid,
            event.characteristic.value.len(),
            subscribers.len()
        );
    }

    /// Subscribe to events published from now on.
    pub(crate) fn subscribe(&self, id: CharacteristicId) -> NotificationStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().push(tx);
        NotificationStream { id, rx }
    }

    /// Record that notifications are enabled for `id`. Returns `true` the first time.
    pub(crate) fn mark_enabled(&self, id: CharacteristicId) -> bool {
        self.enabled.lock().insert(id)
    }

    /// Undo [`mark_enabled`](Self::mark_enabled) after the hardware refused the request.
    pub(crate) fn unmark_enabled(&self, id: &CharacteristicId) {
        self.enabled.lock().remove(id);
    }

    /// Forget every enabled characteristic, e.g. once the link is gone.
    pub(crate) fn forget_enabled(&self) {
        self.enabled.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Live notifications for a single characteristic.
///
/// The stream only ends if the link controller that produced it is dropped. Dropping the
/// stream stops delivery to this subscriber only.
#[derive(Debug)]
pub struct NotificationStream {
    id: CharacteristicId,
    rx: UnboundedReceiver<NotificationEvent>,
}

impl NotificationStream {
    /// The characteristic this stream is filtered to.
    pub fn characteristic_id(&self) -> CharacteristicId {
        self.id
    }
}

impl Stream for NotificationStream {
    type Item = NotificationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match self.rx.poll_next_unpin(cx) {
                Poll::Ready(Some(event)) if event.characteristic.id() == self.id => {
                    return Poll::Ready(Some(event));
                }
                Poll::Ready(Some(_)) => continue,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl FusedStream for NotificationStream {
    fn is_terminated(&self) -> bool {
        self.rx.is_terminated()
    }
}
