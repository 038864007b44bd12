//! Response envelopes produced by hardware callbacks.
//!
//! Every round-trip command is answered by exactly one [`GattResponse`]. The envelope carries
//! the hardware status and a payload typed by the operation that produced it.

use crate::gatt::state::ConnectionState;
use crate::gatt::types::{GattCharacteristic, GattService, GattStatus};

/// Which operation produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResponseKind {
    /// Connection state changed.
    ConnectionStateChanged,
    /// ATT MTU changed.
    MtuChanged,
    /// Remote RSSI was read.
    RssiRead,
    /// Service discovery completed.
    ServicesDiscovered,
    /// A characteristic was read.
    CharacteristicRead,
    /// A characteristic was written.
    CharacteristicWrite,
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Result of a single hardware request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattResponse {
    /// Connection state changed to the raw hardware `state`.
    ConnectionStateChanged {
        /// Hardware status.
        status: GattStatus,
        /// Raw hardware connection state.
        state: i32,
    },
    /// The ATT MTU was negotiated.
    MtuChanged {
        /// Hardware status.
        status: GattStatus,
        /// Negotiated MTU.
        mtu: u16,
    },
    /// The remote RSSI was read.
    RssiRead {
        /// Hardware status.
        status: GattStatus,
        /// Signal strength in dBm.
        rssi: i16,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        /// Hardware status.
        status: GattStatus,
        /// Discovered services.
        services: Vec<GattService>,
    },
    /// A characteristic read finished.
    CharacteristicRead {
        /// Hardware status.
        status: GattStatus,
        /// Characteristic with the value read.
        characteristic: GattCharacteristic,
    },
    /// A characteristic write finished.
    CharacteristicWrite {
        /// Hardware status.
        status: GattStatus,
        /// Characteristic as written.
        characteristic: GattCharacteristic,
    },
}

impl GattResponse {
    /// The kind of operation this response answers.
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::ConnectionStateChanged { .. } => ResponseKind::ConnectionStateChanged,
            Self::MtuChanged { .. } => ResponseKind::MtuChanged,
            Self::RssiRead { .. } => ResponseKind::RssiRead,
            Self::ServicesDiscovered { .. } => ResponseKind::ServicesDiscovered,
            Self::CharacteristicRead { .. } => ResponseKind::CharacteristicRead,
            Self::CharacteristicWrite { .. } => ResponseKind::CharacteristicWrite,
        }
    }

    /// The hardware status.
    pub fn status(&self) -> GattStatus {
        match self {
            Self::ConnectionStateChanged { status, .. }
            | Self::MtuChanged { status, .. }
            | Self::RssiRead { status, .. }
            | Self::ServicesDiscovered { status, .. }
            | Self::CharacteristicRead { status, .. }
            | Self::CharacteristicWrite { status, .. } => *status,
        }
    }

    /// Check if the hardware reported success.
    pub fn is_successful(&self) -> bool {
        self.status().is_success()
    }

    /// Connection state carried by a `ConnectionStateChanged` response.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        match self {
            Self::ConnectionStateChanged { state, .. } => Some(ConnectionState::from_raw(*state)),
            _ => None,
        }
    }

    /// Negotiated MTU carried by an `MtuChanged` response.
    pub fn mtu(&self) -> Option<u16> {
        match self {
            Self::MtuChanged { mtu, .. } => Some(*mtu),
            _ => None,
        }
    }

    /// Signal strength carried by an `RssiRead` response.
    pub fn rssi(&self) -> Option<i16> {
        match self {
            Self::RssiRead { rssi, .. } => Some(*rssi),
            _ => None,
        }
    }

    /// Take the services out of a `ServicesDiscovered` response.
    pub fn into_services(self) -> Option<Vec<GattService>> {
        match self {
            Self::ServicesDiscovered { services, .. } => Some(services),
            _ => None,
        }
    }

    /// Take the characteristic out of a read or write response.
    pub fn into_characteristic(self) -> Option<GattCharacteristic> {
        match self {
            Self::CharacteristicRead { characteristic, .. }
            | Self::CharacteristicWrite { characteristic, .. } => Some(characteristic),
            _ => None,
        }
    }
}
