//! Bluetooth Low Energy backends and standard GATT profiles.
//!
//! [`BtleplugHardware`] drives a [`GattLink`](crate::GattLink) over a btleplug peripheral.

pub mod device_info;
pub mod peripheral;
pub mod uuids;

pub use device_info::DeviceInformation;
pub use peripheral::{default_adapter, BtleplugHardware};
pub use uuids::*;
