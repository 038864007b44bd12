//! Error types for the gatt-link crate.

use std::time::Duration;

use thiserror::Error;

use crate::gatt::response::ResponseKind;
use crate::gatt::state::ConnectionState;
use crate::gatt::types::{GattStatus, Operation};

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Operation requires a link handle but none has been created yet.
    #[error("Not connected, call connect() first")]
    NotConnected,

    /// The operation is not legal in the current connection state.
    #[error("Expected state {expected} but found {actual}")]
    InvalidState {
        /// The state the operation requires.
        expected: ConnectionState,
        /// The state the link was actually in.
        actual: ConnectionState,
    },

    /// The hardware declined to accept the request.
    #[error("Cannot send {operation} command")]
    CommandNotAccepted {
        /// The operation that was rejected.
        operation: Operation,
    },

    /// The hardware accepted the request but reported a failure status.
    #[error("{operation} command failed with status {status}")]
    CommandFailed {
        /// The operation that failed.
        operation: Operation,
        /// The status reported by the hardware.
        status: GattStatus,
    },

    /// No response arrived within the command timeout.
    #[error("{operation} command timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: Operation,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The response received does not belong to the awaited operation.
    #[error("Unexpected response for {operation}: expected {expected}, got {actual}")]
    ProtocolViolation {
        /// The operation that was awaiting a response.
        operation: Operation,
        /// The response kind that was expected.
        expected: ResponseKind,
        /// The response kind that actually arrived.
        actual: ResponseKind,
    },

    /// The link went down while the command was waiting for its response.
    #[error("Link lost during {operation} command")]
    ConnectionLost {
        /// The operation that was in flight.
        operation: Operation,
    },

    /// Failed to establish a connection to the peer.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The hardware refused to enable notifications for a characteristic.
    #[error("Cannot enable notifications for characteristic {uuid}")]
    NotificationNotEnabled {
        /// The UUID of the characteristic.
        uuid: String,
    },

    /// Invalid data was received from the peer.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },
}

impl Error {
    /// Check if this error is a precondition violation (nothing was sent to the hardware).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::InvalidParameter { .. } | Self::NotConnected
        )
    }

    /// The hardware status attached to a failed command, if any.
    pub fn status(&self) -> Option<GattStatus> {
        match self {
            Self::CommandFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CommandFailed {
            operation: Operation::ReadCharacteristic,
            status: GattStatus::READ_NOT_PERMITTED,
        };
        assert_eq!(
            err.to_string(),
            "ReadCharacteristic command failed with status 0x0002"
        );

        let err = Error::InvalidState {
            expected: ConnectionState::Disconnected,
            actual: ConnectionState::Connected,
        };
        assert_eq!(
            err.to_string(),
            "Expected state Disconnected but found Connected"
        );

        let err = Error::ConnectionLost {
            operation: Operation::WriteCharacteristic,
        };
        assert_eq!(err.to_string(), "Link lost during WriteCharacteristic command");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::NotConnected.is_precondition());
        assert!(!Error::Timeout {
            operation: Operation::ReadRssi,
            timeout: Duration::from_secs(10),
        }
        .is_precondition());

        let err = Error::CommandFailed {
            operation: Operation::WriteCharacteristic,
            status: GattStatus::FAILURE,
        };
        assert_eq!(err.status(), Some(GattStatus::FAILURE));
        assert_eq!(Error::NotConnected.status(), None);
    }
}
