//! Link configuration.

use std::time::Duration;

/// Tunables for a [`GattLink`](crate::GattLink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// How long a round-trip command waits for its response.
    pub command_timeout: Duration,
}

impl LinkConfig {
    /// Default command timeout (10 seconds).
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

    /// Set the command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_timeout: Self::DEFAULT_COMMAND_TIMEOUT,
        }
    }
}
