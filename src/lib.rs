// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # gatt-link
//!
//! A request/response layer over a callback-driven Bluetooth Low Energy GATT stack.
//!
//! BLE stacks typically accept one outstanding request per link and report its outcome
//! through an asynchronous callback. This library turns that into plain `async` calls:
//!
//! - **Serialized commands**: one request in flight per link, correlated with its response
//! - **Connection state**: observable with replay of the current state
//! - **Notifications**: per-characteristic streams with any number of subscribers
//! - **Timeouts**: every command is bounded, default 10 seconds
//! - **btleplug backend**: drive a real peripheral on Linux, macOS and Windows
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use btleplug::api::Central;
//! use futures::StreamExt;
//! use gatt_link::ble::{default_adapter, BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID};
//! use gatt_link::{BtleplugHardware, GattController, GattLink, Phy, Result, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let adapter = default_adapter().await?;
//!     let peripheral = adapter.peripherals().await?.into_iter().next().unwrap();
//!
//!     let link = GattLink::new(BtleplugHardware::new(adapter, peripheral));
//!     link.connect(Transport::Le, Phy::LE_1M).await?;
//!     link.discover_services().await?;
//!
//!     if let Some(service) = link.get_service(&BATTERY_SERVICE_UUID)? {
//!         let level = service.characteristic(&BATTERY_LEVEL_UUID).unwrap().clone();
//!         println!("Battery: {:?}", link.read_characteristic(&level).await?.value);
//!
//!         let mut updates = link.observe_characteristic(&level)?;
//!         if let Some(event) = updates.next().await {
//!             println!("Battery changed: {:?}", event.characteristic.value);
//!         }
//!     }
//!
//!     link.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Hardware
//!
//! Any stack can back a [`GattLink`] by implementing [`GattHardware`] and [`GattHandle`] and
//! reporting outcomes through the [`GattCallback`] it is given.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod ble;
pub mod config;
pub mod error;
pub mod gatt;
pub mod link;

// Re-exports for convenience
pub use ble::{BtleplugHardware, DeviceInformation};
pub use config::LinkConfig;
pub use error::{Error, Result};
pub use link::{GattController, GattLink, MAX_ATT_MTU, MIN_ATT_MTU};

// Re-export commonly used types from submodules
pub use gatt::{
    CharacteristicId, ConnectOptions, ConnectionState, GattCallback, GattCharacteristic,
    GattHandle, GattHardware, GattResponse, GattService, GattStatus, NotificationEvent,
    NotificationStream, Operation, Phy, ResponseKind, Transport,
};
