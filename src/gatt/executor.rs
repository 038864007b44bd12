//! Serialized command execution over the link.
//!
//! Only one command may have a hardware request outstanding at a time. The executor holds a
//! link-wide lock for the full round trip (submit, then wait for the correlated response),
//! so responses are correlated simply by being the next one delivered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::gatt::response::{GattResponse, ResponseKind};
use crate::gatt::slot::CorrelationSlot;
use crate::gatt::state::ConnectionState;
use crate::gatt::types::Operation;

/// Runs hardware requests one at a time and returns their typed results.
pub(crate) struct CommandExecutor {
    lock: Mutex<()>,
    slot: Arc<CorrelationSlot>,
    timeout: Duration,
}

impl CommandExecutor {
    pub(crate) fn new(slot: Arc<CorrelationSlot>, timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            slot,
            timeout,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit a request and wait for its response.
    ///
    /// `submit` reports whether the hardware accepted the request, or fails before anything is
    /// sent. `extract` pulls the typed payload out of the validated response.
    pub(crate) async fn execute<T, S, E>(
        &self,
        operation: Operation,
        expected: ResponseKind,
        submit: S,
        extract: E,
    ) -> Result<T>
    where
        S: FnOnce() -> Result<bool>,
        E: FnOnce(GattResponse) -> Option<T>,
    {
        self.execute_until(operation, expected, submit, |_| true, extract)
            .await
    }

    /// Like [`execute`](Self::execute), but keeps waiting while successful responses of the
    /// expected kind are not yet `settled`.
    pub(crate) async fn execute_until<T, S, P, E>(
        &self,
        operation: Operation,
        expected: ResponseKind,
        submit: S,
        settled: P,
        extract: E,
    ) -> Result<T>
    where
        S: FnOnce() -> Result<bool>,
        P: Fn(&GattResponse) -> bool,
        E: FnOnce(GattResponse) -> Option<T>,
    {
        let _guard = self.lock.lock().await;
        let _armed = self.slot.arm();

        if !submit()? {
            warn!("Hardware rejected {} command", operation);
            return Err(Error::CommandNotAccepted { operation });
        }

        debug!("Sent {} command, awaiting {}", operation, expected);

        let wait = async {
            loop {
                let response = self.slot.receive().await;
                if !response.is_successful() || response.kind() != expected || settled(&response)
                {
                    return response;
                }
                trace!("{} still in progress: {:?}", operation, response);
            }
        };

        let response = tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| {
                warn!("{} command timed out after {:?}", operation, self.timeout);
                Error::Timeout {
                    operation,
                    timeout: self.timeout,
                }
            })?;

        if expected != ResponseKind::ConnectionStateChanged
            && response.connection_state() == Some(ConnectionState::Disconnected)
        {
            warn!("Link lost while awaiting {} response", operation);
            return Err(Error::ConnectionLost { operation });
        }

        if !response.is_successful() {
            warn!(
                "{} command failed with status {}",
                operation,
                response.status()
            );
            return Err(Error::CommandFailed {
                operation,
                status: response.status(),
            });
        }

        let actual = response.kind();
        if actual != expected {
            warn!(
                "{} command received {} response, expected {}",
                operation, actual, expected
            );
            return Err(Error::ProtocolViolation {
                operation,
                expected,
                actual,
            });
        }

        extract(response).ok_or(Error::ProtocolViolation {
            operation,
            expected,
            actual,
        })
    }

    /// Run `f` while no command is in flight.
    pub(crate) async fn exclusive<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.lock.lock().await;
        f()
    }

    /// Submit a request without waiting for a response.
    pub(crate) async fn submit<S>(&self, operation: Operation, submit: S) -> Result<()>
    where
        S: FnOnce() -> Result<bool>,
    {
        let _guard = self.lock.lock().await;

        if !submit()? {
            warn!("Hardware rejected {} command", operation);
            return Err(Error::CommandNotAccepted { operation });
        }

        debug!("Sent {} command", operation);
        Ok(())
    }
}
