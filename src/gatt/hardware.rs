//! The hardware layer consumed by the link controller.
//!
//! Submission methods only report whether a request was accepted. The actual result arrives
//! later through the [`GattCallback`] handed to [`GattHardware::connect_gatt`], possibly on
//! another thread.

use std::sync::Arc;

use uuid::Uuid;

use crate::gatt::callback::GattCallback;
use crate::gatt::types::{ConnectOptions, GattCharacteristic, GattService};

/// Factory for link handles to one remote device.
#[cfg_attr(test, mockall::automock)]
pub trait GattHardware: Send + Sync + 'static {
    /// Create the link handle and start connecting.
    ///
    /// Returns `None` if the platform cannot create a handle (for example when Bluetooth is
    /// disabled). Connection progress is reported through `callback`.
    fn connect_gatt(
        &self,
        options: ConnectOptions,
        callback: GattCallback,
    ) -> Option<Arc<dyn GattHandle>>;
}

/// Live handle to the hardware link.
#[cfg_attr(test, mockall::automock)]
pub trait GattHandle: Send + Sync + 'static {
    /// Re-establish a link that was previously disconnected.
    fn connect(&self) -> bool;

    /// Request disconnection.
    fn disconnect(&self) -> bool;

    /// Release the handle. No callbacks are expected afterwards.
    fn close(&self);

    /// Start service discovery.
    fn discover_services(&self) -> bool;

    /// Request an ATT MTU.
    fn request_mtu(&self, mtu: u16) -> bool;

    /// Request the remote signal strength.
    fn read_remote_rssi(&self) -> bool;

    /// Request a characteristic read.
    fn read_characteristic(&self, characteristic: &GattCharacteristic) -> bool;

    /// Request a characteristic write of `characteristic.value`.
    fn write_characteristic(&self, characteristic: &GattCharacteristic) -> bool;

    /// Look up an already discovered service. Never touches the radio.
    fn get_service(&self, uuid: &Uuid) -> Option<GattService>;

    /// Enable or disable value notifications.
    ///
    /// Returns `true` if the request succeeded and `false` if it was refused.
    fn set_characteristic_notification(
        &self,
        characteristic: &GattCharacteristic,
        enable: bool,
    ) -> bool;
}
