//! Translation of hardware callbacks into state transitions, responses and notifications.
//!
//! Hardware callbacks may fire on any thread. They only enqueue a [`HardwareEvent`]; a single
//! dispatcher task applies the events in the order they were reported.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::gatt::notifications::NotificationBus;
use crate::gatt::response::GattResponse;
use crate::gatt::slot::CorrelationSlot;
use crate::gatt::state::{ConnectionState, StateCell};
use crate::gatt::types::{GattCharacteristic, GattService, GattStatus};

/// Something the hardware reported.
#[derive(Debug, Clone)]
pub(crate) enum HardwareEvent {
    /// Result of a request, or a connection state change.
    Response(GattResponse),
    /// A subscribed characteristic changed value.
    CharacteristicChanged(GattCharacteristic),
}

/// Callback sink handed to the hardware layer.
///
/// Cheap to clone, and safe to call from any thread.
#[derive(Debug, Clone)]
pub struct GattCallback {
    tx: mpsc::UnboundedSender<HardwareEvent>,
}

impl GattCallback {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<HardwareEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: HardwareEvent) {
        if self.tx.send(event).is_err() {
            debug!("Link controller is gone, dropping hardware callback");
        }
    }

    /// The connection state changed to the raw hardware code `new_state`.
    pub fn on_connection_state_change(&self, status: GattStatus, new_state: i32) {
        self.emit(HardwareEvent::Response(
            GattResponse::ConnectionStateChanged {
                status,
                state: new_state,
            },
        ));
    }

    /// Service discovery finished.
    pub fn on_services_discovered(&self, services: Vec<GattService>, status: GattStatus) {
        self.emit(HardwareEvent::Response(GattResponse::ServicesDiscovered {
            status,
            services,
        }));
    }

    /// The ATT MTU changed.
    pub fn on_mtu_changed(&self, mtu: u16, status: GattStatus) {
        self.emit(HardwareEvent::Response(GattResponse::MtuChanged {
            status,
            mtu,
        }));
    }

    /// The remote RSSI was read.
    pub fn on_read_remote_rssi(&self, rssi: i16, status: GattStatus) {
        self.emit(HardwareEvent::Response(GattResponse::RssiRead {
            status,
            rssi,
        }));
    }

    /// A characteristic read finished.
    pub fn on_characteristic_read(&self, characteristic: GattCharacteristic, status: GattStatus) {
        self.emit(HardwareEvent::Response(GattResponse::CharacteristicRead {
            status,
            characteristic,
        }));
    }

    /// A characteristic write finished.
    pub fn on_characteristic_write(&self, characteristic: GattCharacteristic, status: GattStatus) {
        self.emit(HardwareEvent::Response(GattResponse::CharacteristicWrite {
            status,
            characteristic,
        }));
    }

    /// A subscribed characteristic changed value.
    pub fn on_characteristic_changed(&self, characteristic: GattCharacteristic) {
        self.emit(HardwareEvent::CharacteristicChanged(characteristic));
    }
}

/// Applies hardware events to the link's shared state.
pub(crate) struct CallbackTranslator {
    pub(crate) state: Arc<StateCell>,
    pub(crate) slot: Arc<CorrelationSlot>,
    pub(crate) notifications: Arc<NotificationBus>,
}

impl CallbackTranslator {
    pub(crate) fn apply(&self, event: HardwareEvent) {
        match event {
            HardwareEvent::Response(response) => {
                if let Some(state) = response.connection_state() {
                    self.state.set(state);
                    if state == ConnectionState::Disconnected {
                        self.notifications.forget_enabled();
                    }
                }
                trace!("Hardware response: {:?}", response);
                self.slot.deliver(response);
            }
            HardwareEvent::CharacteristicChanged(characteristic) => {
                self.notifications.publish(characteristic);
            }
        }
    }

    /// Drain events until every [`GattCallback`] has been dropped.
    pub(crate) async fn run(self, mut events: mpsc::UnboundedReceiver<HardwareEvent>) {
        debug!("Callback dispatcher started");
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
        debug!("Callback dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::state::{STATE_CONNECTED, STATE_CONNECTING};
    use btleplug::api::CharPropFlags;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn translator() -> CallbackTranslator {
        CallbackTranslator {
            state: Arc::new(StateCell::new()),
            slot: Arc::new(CorrelationSlot::new()),
            notifications: Arc::new(NotificationBus::new()),
        }
    }

    #[tokio::test]
    async fn test_state_change_updates_state_and_slot() {
        let translator = translator();
        let _armed = translator.slot.arm();

        translator.apply(HardwareEvent::Response(
            GattResponse::ConnectionStateChanged {
                status: GattStatus::SUCCESS,
                state: STATE_CONNECTED,
            },
        ));

        assert_eq!(translator.state.get(), ConnectionState::Connected);
        assert_eq!(
            translator.slot.receive().await.connection_state(),
            Some(ConnectionState::Connected)
        );
    }

    #[tokio::test]
    async fn test_state_change_without_waiter_still_updates_state() {
        let translator = translator();

        translator.apply(HardwareEvent::Response(
            GattResponse::ConnectionStateChanged {
                status: GattStatus::SUCCESS,
                state: STATE_CONNECTING,
            },
        ));

        assert_eq!(translator.state.get(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn test_notifications_bypass_slot() {
        let translator = translator();
        let _armed = translator.slot.arm();
        let characteristic = GattCharacteristic::new(
            Uuid::from_u128(0x2a37),
            Uuid::from_u128(0x180d),
            CharPropFlags::NOTIFY,
        );
        let mut stream = translator.notifications.subscribe(characteristic.id());

        translator.apply(HardwareEvent::CharacteristicChanged(
            characteristic.clone().with_value(vec![60]),
        ));

        let event = stream.next().await.unwrap();
        assert_eq!(event.characteristic.value.as_ref(), &[60]);

        // Nothing reached the command path.
        let received =
            tokio::time::timeout(std::time::Duration::from_millis(10), translator.slot.receive())
                .await;
        assert!(received.is_err());
    }

    #[tokio::test]
    async fn test_callbacks_preserve_order() {
        let translator = translator();
        let state = translator.state.clone();
        let mut rx = state.subscribe();
        let (callback, events) = GattCallback::channel();

        let dispatcher = tokio::spawn(translator.run(events));

        callback.on_connection_state_change(GattStatus::SUCCESS, STATE_CONNECTING);
        callback.on_connection_state_change(GattStatus::SUCCESS, STATE_CONNECTED);
        drop(callback);
        dispatcher.await.unwrap();

        assert_eq!(*rx.borrow_and_update(), ConnectionState::Connected);
    }
}
