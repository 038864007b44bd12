//! The link controller.
//!
//! [`GattLink`] owns the hardware handle for one remote device and exposes request/response
//! GATT operations on top of it. Round-trip commands are serialized through a single
//! link-wide lock; notifications and connection state are delivered independently.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::gatt::callback::{CallbackTranslator, GattCallback};
use crate::gatt::executor::CommandExecutor;
use crate::gatt::hardware::{GattHandle, GattHardware};
use crate::gatt::notifications::{NotificationBus, NotificationStream};
use crate::gatt::response::{GattResponse, ResponseKind};
use crate::gatt::slot::CorrelationSlot;
use crate::gatt::state::{ConnectionState, StateCell, STATE_DISCONNECTED};
use crate::gatt::types::{
    ConnectOptions, GattCharacteristic, GattService, GattStatus, Operation, Phy, Transport,
};

/// Smallest ATT MTU allowed by the Bluetooth specification.
pub const MIN_ATT_MTU: u16 = 23;
/// Largest ATT MTU a peer can negotiate.
pub const MAX_ATT_MTU: u16 = 517;

/// Request/response access to a single GATT link.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GattController: Send + Sync {
    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Observe the connection state. The receiver always holds the current value.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// Connect to the peer. Only legal while disconnected.
    async fn connect(&self, transport: Transport, phy: Phy) -> Result<()>;

    /// Request disconnection.
    ///
    /// Returns once the hardware accepted the request; the state changes when the
    /// hardware reports it.
    async fn disconnect(&self) -> Result<()>;

    /// Discover the services of the peer.
    async fn discover_services(&self) -> Result<Vec<GattService>>;

    /// Request an ATT MTU and return the negotiated value.
    async fn request_mtu(&self, mtu: u16) -> Result<u16>;

    /// Read the remote signal strength in dBm.
    async fn read_rssi(&self) -> Result<i16>;

    /// Read a characteristic, returning it with the value read.
    async fn read_characteristic(
        &self,
        characteristic: &GattCharacteristic,
    ) -> Result<GattCharacteristic>;

    /// Write `characteristic.value`, returning the characteristic as confirmed written.
    async fn write_characteristic(
        &self,
        characteristic: &GattCharacteristic,
    ) -> Result<GattCharacteristic>;

    /// Look up an already discovered service without a round trip.
    fn get_service(&self, uuid: &Uuid) -> Result<Option<GattService>>;

    /// Enable notifications for `characteristic` and observe its value changes.
    fn observe_characteristic(
        &self,
        characteristic: &GattCharacteristic,
    ) -> Result<NotificationStream>;
}

/// Link controller for one remote device.
pub struct GattLink {
    /// Creates the link handle on first connect.
    hardware: Box<dyn GattHardware>,
    /// Live hardware handle, present once created and until closed.
    handle: RwLock<Option<Arc<dyn GattHandle>>>,
    /// Callback sink given to the hardware.
    callback: GattCallback,
    /// Current connection state.
    state: Arc<StateCell>,
    /// Notification fan-out.
    notifications: Arc<NotificationBus>,
    /// Serialized command path.
    executor: CommandExecutor,
    /// Task applying hardware callbacks.
    dispatcher: JoinHandle<()>,
}

impl GattLink {
    /// Create a link controller with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(hardware: impl GattHardware) -> Self {
        Self::with_config(hardware, LinkConfig::default())
    }

    /// Create a link controller with a custom configuration.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_config(hardware: impl GattHardware, config: LinkConfig) -> Self {
        let state = Arc::new(StateCell::new());
        let slot = Arc::new(CorrelationSlot::new());
        let notifications = Arc::new(NotificationBus::new());
        let (callback, events) = GattCallback::channel();

        let translator = CallbackTranslator {
            state: state.clone(),
            slot: slot.clone(),
            notifications: notifications.clone(),
        };
        let dispatcher = tokio::spawn(translator.run(events));

        Self {
            hardware: Box::new(hardware),
            handle: RwLock::new(None),
            callback,
            state,
            notifications,
            executor: CommandExecutor::new(slot, config.command_timeout),
            dispatcher,
        }
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state.get().is_connected()
    }

    /// Check if a link handle exists.
    pub fn has_handle(&self) -> bool {
        self.handle.read().is_some()
    }

    /// Wait until the connection state equals `expected`.
    pub async fn wait_for_state(&self, expected: ConnectionState) {
        let mut rx = self.state.subscribe();
        loop {
            if *rx.borrow_and_update() == expected {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Close the link handle for good.
    ///
    /// The next [`connect`](GattController::connect) creates a fresh handle. If the hardware
    /// had not yet reported a disconnection, the link is recorded as disconnected since no
    /// further callbacks will arrive.
    pub async fn close(&self) {
        let closed = self
            .executor
            .exclusive(|| self.handle.write().take())
            .await;

        if let Some(handle) = closed {
            info!("Closing link handle");
            handle.close();
        }

        self.notifications.forget_enabled();

        if self.state.get() != ConnectionState::Disconnected {
            self.callback
                .on_connection_state_change(GattStatus::SUCCESS, STATE_DISCONNECTED);
        }
    }

    fn require_state(&self, expected: ConnectionState) -> Result<()> {
        let actual = self.state.get();
        if actual != expected {
            return Err(Error::InvalidState { expected, actual });
        }
        Ok(())
    }

    fn require_handle(&self) -> Result<Arc<dyn GattHandle>> {
        self.handle.read().clone().ok_or(Error::NotConnected)
    }

    /// Create the handle on first use, otherwise reconnect the existing one.
    fn submit_connect(&self, options: ConnectOptions) -> Result<bool> {
        self.require_state(ConnectionState::Disconnected)?;

        if let Some(handle) = self.handle.read().clone() {
            debug!("Reconnecting existing link handle");
            return Ok(handle.connect());
        }

        let handle = self
            .hardware
            .connect_gatt(options, self.callback.clone())
            .ok_or(Error::BluetoothUnavailable)?;
        *self.handle.write() = Some(handle);

        Ok(true)
    }
}

#[async_trait]
impl GattController for GattLink {
    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    async fn connect(&self, transport: Transport, phy: Phy) -> Result<()> {
        self.require_state(ConnectionState::Disconnected)?;

        let options = ConnectOptions { transport, phy };
        info!("Connecting ({:?}, phy {:#04x})", transport, phy.0);

        let state = self
            .executor
            .execute_until(
                Operation::Connect,
                ResponseKind::ConnectionStateChanged,
                || self.submit_connect(options),
                |response| response.connection_state() != Some(ConnectionState::Connecting),
                |response| response.connection_state(),
            )
            .await?;

        if !state.is_connected() {
            warn!("Connection settled in state {}", state);
            return Err(Error::ConnectionFailed {
                reason: format!("link settled in state {}", state),
            });
        }

        info!("Connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting");

        self.executor
            .submit(Operation::Disconnect, || {
                Ok(self.require_handle()?.disconnect())
            })
            .await
    }

    async fn discover_services(&self) -> Result<Vec<GattService>> {
        let services = self
            .executor
            .execute(
                Operation::DiscoverServices,
                ResponseKind::ServicesDiscovered,
                || Ok(self.require_handle()?.discover_services()),
                GattResponse::into_services,
            )
            .await?;

        debug!("Discovered {} services", services.len());
        Ok(services)
    }

    async fn request_mtu(&self, mtu: u16) -> Result<u16> {
        if !(MIN_ATT_MTU..=MAX_ATT_MTU).contains(&mtu) {
            return Err(Error::InvalidParameter {
                name: "mtu".to_string(),
                value: mtu.to_string(),
            });
        }

        let negotiated = self
            .executor
            .execute(
                Operation::RequestMtu,
                ResponseKind::MtuChanged,
                || Ok(self.require_handle()?.request_mtu(mtu)),
                |response| response.mtu(),
            )
            .await?;

        debug!("MTU negotiated: requested {}, got {}", mtu, negotiated);
        Ok(negotiated)
    }

    async fn read_rssi(&self) -> Result<i16> {
        self.executor
            .execute(
                Operation::ReadRssi,
                ResponseKind::RssiRead,
                || Ok(self.require_handle()?.read_remote_rssi()),
                |response| response.rssi(),
            )
            .await
    }

    async fn read_characteristic(
        &self,
        characteristic: &GattCharacteristic,
    ) -> Result<GattCharacteristic> {
        self.executor
            .execute(
                Operation::ReadCharacteristic,
                ResponseKind::CharacteristicRead,
                || Ok(self.require_handle()?.read_characteristic(characteristic)),
                GattResponse::into_characteristic,
            )
            .await
    }

    async fn write_characteristic(
        &self,
        characteristic: &GattCharacteristic,
    ) -> Result<GattCharacteristic> {
        self.executor
            .execute(
                Operation::WriteCharacteristic,
                ResponseKind::CharacteristicWrite,
                || Ok(self.require_handle()?.write_characteristic(characteristic)),
                GattResponse::into_characteristic,
            )
            .await
    }

    fn get_service(&self, uuid: &Uuid) -> Result<Option<GattService>> {
        Ok(self.require_handle()?.get_service(uuid))
    }

    fn observe_characteristic(
        &self,
        characteristic: &GattCharacteristic,
    ) -> Result<NotificationStream> {
        let handle = self.require_handle()?;
        let id = characteristic.id();

        // Subscribe before enabling so no early notification is missed.
        let stream = self.notifications.subscribe(id);

        if self.notifications.mark_enabled(id) {
            debug!("Enabling notifications for {}", characteristic.uuid);

            if !handle.set_characteristic_notification(characteristic, true) {
                self.notifications.unmark_enabled(&id);
                warn!("Cannot enable notifications for {}", characteristic.uuid);
                return Err(Error::NotificationNotEnabled {
                    uuid: characteristic.uuid.to_string(),
                });
            }
        }

        Ok(stream)
    }
}

impl Drop for GattLink {
    fn drop(&mut self) {
        self.dispatcher.abort();

        if let Some(handle) = self.handle.get_mut().take() {
            handle.close();
        }
    }
}

impl std::fmt::Debug for GattLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattLink")
            .field("state", &self.state.get())
            .field("has_handle", &self.has_handle())
            .field("command_timeout", &self.executor.timeout())
            .finish()
    }
}
