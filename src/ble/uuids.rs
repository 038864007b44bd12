//! Standard Bluetooth SIG service and characteristic UUIDs.

use uuid::Uuid;

/// The Bluetooth base UUID, `0000xxxx-0000-1000-8000-00805f9b34fb`.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;

/// Expand a 16-bit SIG-assigned UUID to its full 128-bit form.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Return the 16-bit short form if `uuid` is based on the Bluetooth base UUID.
pub fn uuid_to_u16(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = (value >> 96) as u32;
    if value & !(0xffff_ffff << 96) == BLUETOOTH_BASE_UUID && short <= u16::MAX as u32 {
        Some(short as u16)
    } else {
        None
    }
}

// Generic Access Service
/// Generic Access service UUID.
pub const GENERIC_ACCESS_SERVICE_UUID: Uuid = uuid_from_u16(0x1800);
/// Device Name characteristic UUID.
pub const DEVICE_NAME_UUID: Uuid = uuid_from_u16(0x2a00);

// Device Information Service
/// Standard BLE Device Information Service UUID.
pub const DEVICE_INFO_SERVICE_UUID: Uuid = uuid_from_u16(0x180a);
/// Manufacturer Name characteristic UUID.
pub const MANUFACTURER_NAME_UUID: Uuid = uuid_from_u16(0x2a29);
/// Model Number characteristic UUID.
pub const MODEL_NUMBER_UUID: Uuid = uuid_from_u16(0x2a24);
/// Serial Number characteristic UUID.
pub const SERIAL_NUMBER_UUID: Uuid = uuid_from_u16(0x2a25);
/// Hardware Revision characteristic UUID.
pub const HARDWARE_REVISION_UUID: Uuid = uuid_from_u16(0x2a27);
/// Firmware Revision characteristic UUID.
pub const FIRMWARE_REVISION_UUID: Uuid = uuid_from_u16(0x2a26);
/// Software Revision characteristic UUID.
pub const SOFTWARE_REVISION_UUID: Uuid = uuid_from_u16(0x2a28);

// Battery Service
/// Battery Service UUID.
pub const BATTERY_SERVICE_UUID: Uuid = uuid_from_u16(0x180f);
/// Battery Level characteristic UUID (Read, Notify).
pub const BATTERY_LEVEL_UUID: Uuid = uuid_from_u16(0x2a19);

/// Client Characteristic Configuration descriptor UUID.
pub const CLIENT_CHARACTERISTIC_CONFIG_UUID: Uuid = uuid_from_u16(0x2902);
