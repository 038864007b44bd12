//! Value types shared by the link controller and the hardware layer.

use btleplug::api::{CharPropFlags, WriteType};
use bytes::Bytes;
use uuid::Uuid;

/// Status code reported by the hardware for a completed request.
///
/// Only [`GattStatus::SUCCESS`] means success; every other value is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattStatus(pub i32);

impl GattStatus {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0x00);
    /// Reading the attribute is not permitted.
    pub const READ_NOT_PERMITTED: Self = Self(0x02);
    /// Writing the attribute is not permitted.
    pub const WRITE_NOT_PERMITTED: Self = Self(0x03);
    /// Insufficient authentication for the operation.
    pub const INSUFFICIENT_AUTHENTICATION: Self = Self(0x05);
    /// The peer does not support the request.
    pub const REQUEST_NOT_SUPPORTED: Self = Self(0x06);
    /// A read or write used an invalid offset.
    pub const INVALID_OFFSET: Self = Self(0x07);
    /// A write used an invalid attribute length.
    pub const INVALID_ATTRIBUTE_LENGTH: Self = Self(0x0d);
    /// Insufficient encryption for the operation.
    pub const INSUFFICIENT_ENCRYPTION: Self = Self(0x0f);
    /// The link is congested.
    pub const CONNECTION_CONGESTED: Self = Self(0x8f);
    /// Generic failure.
    pub const FAILURE: Self = Self(0x101);

    /// Check if this status reports success.
    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl std::fmt::Display for GattStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Transport preference for establishing the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transport {
    /// Let the platform choose.
    #[default]
    Auto,
    /// Classic BR/EDR.
    BrEdr,
    /// Low Energy.
    Le,
}

impl Transport {
    /// Raw platform value.
    pub fn to_raw(self) -> i32 {
        match self {
            Self::Auto => 0,
            Self::BrEdr => 1,
            Self::Le => 2,
        }
    }
}

/// Preferred physical layers, as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Phy(pub u8);

impl Phy {
    /// LE 1M PHY.
    pub const LE_1M: Self = Self(0x01);
    /// LE 2M PHY.
    pub const LE_2M: Self = Self(0x02);
    /// LE Coded PHY.
    pub const LE_CODED: Self = Self(0x04);

    /// Combine two PHY masks.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check if every PHY in `other` is part of this mask.
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Phy {
    fn default() -> Self {
        Self::LE_1M
    }
}

/// Parameters for creating or re-establishing the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectOptions {
    /// Transport preference.
    pub transport: Transport,
    /// Preferred PHYs.
    pub phy: Phy,
}

/// Operations that go through the command path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    /// Establish or re-establish the link.
    Connect,
    /// Tear down the link.
    Disconnect,
    /// Discover remote services.
    DiscoverServices,
    /// Negotiate the ATT MTU.
    RequestMtu,
    /// Read the remote signal strength.
    ReadRssi,
    /// Read a characteristic value.
    ReadCharacteristic,
    /// Write a characteristic value.
    WriteCharacteristic,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Identity of a characteristic on the remote device.
///
/// Several characteristics may share a UUID, so the hardware-assigned instance id is part of
/// the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicId {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Instance discriminator assigned by the hardware.
    pub instance_id: u16,
}

/// Snapshot of a remote characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUID of the service this characteristic belongs to.
    pub service_uuid: Uuid,
    /// Instance discriminator assigned by the hardware.
    pub instance_id: u16,
    /// Characteristic properties.
    pub properties: CharPropFlags,
    /// Write type used by `write_characteristic`.
    pub write_type: WriteType,
    /// Last known value.
    pub value: Bytes,
}

impl GattCharacteristic {
    /// Create an empty characteristic snapshot.
    pub fn new(uuid: Uuid, service_uuid: Uuid, properties: CharPropFlags) -> Self {
        Self {
            uuid,
            service_uuid,
            instance_id: 0,
            properties,
            write_type: WriteType::WithResponse,
            value: Bytes::new(),
        }
    }

    /// Identity used to match notifications.
    pub fn id(&self) -> CharacteristicId {
        CharacteristicId {
            uuid: self.uuid,
            instance_id: self.instance_id,
        }
    }

    /// Return a copy with a different instance id.
    pub fn with_instance_id(mut self, instance_id: u16) -> Self {
        self.instance_id = instance_id;
        self
    }

    /// Return a copy carrying `value`.
    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    /// Return a copy using `write_type`.
    pub fn with_write_type(mut self, write_type: WriteType) -> Self {
        self.write_type = write_type;
        self
    }

    /// Check if the characteristic supports notifications or indications.
    pub fn can_notify(&self) -> bool {
        self.properties
            .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
    }
}

/// Snapshot of a remote service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Whether this is a primary service.
    pub primary: bool,
    /// Characteristics of the service.
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Find a characteristic of this service by UUID.
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == *uuid)
    }
}
