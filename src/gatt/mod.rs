//! GATT command engine.
//!
//! This module turns the callback-driven hardware interface into request/response
//! commands, tracks the connection state and fans out value notifications.

pub mod callback;
pub(crate) mod executor;
pub mod hardware;
pub mod notifications;
pub mod response;
pub(crate) mod slot;
pub mod state;
pub mod types;

pub use callback::GattCallback;
pub use hardware::{GattHandle, GattHardware};
pub use notifications::{NotificationEvent, NotificationStream};
pub use response::{GattResponse, ResponseKind};
pub use state::ConnectionState;
pub use types::{
    CharacteristicId, ConnectOptions, GattCharacteristic, GattService, GattStatus, Operation, Phy,
    Transport,
};
