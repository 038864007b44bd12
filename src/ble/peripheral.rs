//! [`GattHardware`] backed by a btleplug peripheral.
//!
//! btleplug exposes async operations rather than callbacks. Each submission is accepted
//! immediately, performed on a spawned task, and its outcome reported through the
//! [`GattCallback`], which makes btleplug look like any other callback-driven stack.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _, Service,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gatt::callback::GattCallback;
use crate::gatt::hardware::{GattHandle, GattHardware};
use crate::gatt::state::{
    STATE_CONNECTED, STATE_CONNECTING, STATE_DISCONNECTED, STATE_DISCONNECTING,
};
use crate::gatt::types::{ConnectOptions, GattCharacteristic, GattService, GattStatus};

/// Get the first Bluetooth adapter of the system.
///
/// # Errors
///
/// Returns an error if Bluetooth is not available.
pub async fn default_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|_e| Error::BluetoothUnavailable)?;

    let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

    let adapter = adapters
        .into_iter()
        .next()
        .ok_or(Error::BluetoothUnavailable)?;

    info!(
        "Using Bluetooth adapter: {:?}",
        adapter.adapter_info().await.ok()
    );

    Ok(adapter)
}

impl From<&Characteristic> for GattCharacteristic {
    fn from(characteristic: &Characteristic) -> Self {
        let write_type = if characteristic
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
            && !characteristic.properties.contains(CharPropFlags::WRITE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        GattCharacteristic::new(
            characteristic.uuid,
            characteristic.service_uuid,
            characteristic.properties,
        )
        .with_write_type(write_type)
    }
}

impl From<&Service> for GattService {
    fn from(service: &Service) -> Self {
        Self {
            uuid: service.uuid,
            primary: service.primary,
            characteristics: service
                .characteristics
                .iter()
                .map(GattCharacteristic::from)
                .collect(),
        }
    }
}

/// Map a btleplug error to the closest GATT status.
fn status_for(error: &btleplug::Error) -> GattStatus {
    match error {
        btleplug::Error::PermissionDenied => GattStatus::INSUFFICIENT_AUTHENTICATION,
        btleplug::Error::NotSupported(_) => GattStatus::REQUEST_NOT_SUPPORTED,
        _ => GattStatus::FAILURE,
    }
}

/// Hardware layer for one btleplug peripheral.
#[derive(Debug, Clone)]
pub struct BtleplugHardware {
    adapter: Adapter,
    peripheral: Peripheral,
}

impl BtleplugHardware {
    /// Create the hardware layer for a peripheral known to `adapter`.
    pub fn new(adapter: Adapter, peripheral: Peripheral) -> Self {
        Self {
            adapter,
            peripheral,
        }
    }

    /// Create the hardware layer for the peripheral with the given id.
    pub async fn from_id(adapter: Adapter, id: &PeripheralId) -> Result<Self> {
        let peripheral = adapter.peripheral(id).await.map_err(Error::Bluetooth)?;
        Ok(Self::new(adapter, peripheral))
    }

    /// The underlying peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }
}

impl GattHardware for BtleplugHardware {
    fn connect_gatt(
        &self,
        options: ConnectOptions,
        callback: GattCallback,
    ) -> Option<Arc<dyn GattHandle>> {
        if tokio::runtime::Handle::try_current().is_err() {
            error!("btleplug link handle requires a Tokio runtime");
            return None;
        }

        // btleplug picks transport and PHY itself.
        debug!(
            "Creating link handle for {:?} ({:?})",
            self.peripheral.id(),
            options
        );

        let handle = BtleplugHandle {
            shared: Arc::new(Shared {
                peripheral: self.peripheral.clone(),
                reporter: LinkStateReporter::new(callback.clone()),
                callback,
                listener: Arc::new(AtomicBool::new(false)),
                subscribed: Mutex::new(Vec::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        };
        handle.watch_disconnections(self.adapter.clone());

        if !handle.connect() {
            return None;
        }

        Some(Arc::new(handle))
    }
}

/// Forwards connection state changes, suppressing stale and repeated reports.
///
/// btleplug announces a teardown both from the disconnect call and from the adapter event
/// stream, in either order. A transition is only forwarded from the states it can follow, so
/// the second announcement of a teardown never reaches a later connect attempt.
struct LinkStateReporter {
    callback: GattCallback,
    last: Mutex<i32>,
}

impl LinkStateReporter {
    fn new(callback: GattCallback) -> Self {
        Self {
            callback,
            last: Mutex::new(STATE_DISCONNECTED),
        }
    }

    /// Report `state` unless it was the last state reported.
    fn report(&self, status: GattStatus, state: i32) -> bool {
        self.transition(
            &[
                STATE_DISCONNECTED,
                STATE_CONNECTING,
                STATE_CONNECTED,
                STATE_DISCONNECTING,
            ],
            status,
            state,
        )
    }

    /// Report `state` only if the last reported state is one of `from`.
    fn transition(&self, from: &[i32], status: GattStatus, state: i32) -> bool {
        let mut last = self.last.lock();

        if *last == state || !from.contains(&*last) {
            trace!("Dropping state report {} after {}", state, *last);
            return false;
        }

        *last = state;
        self.callback.on_connection_state_change(status, state);
        true
    }

    /// Report that an established link went down.
    fn report_lost(&self) -> bool {
        self.transition(
            &[STATE_CONNECTED, STATE_DISCONNECTING],
            GattStatus::SUCCESS,
            STATE_DISCONNECTED,
        )
    }
}

/// Held by the running notification listener. Dropping it allows a new listener to start.
struct ListenerGuard(Arc<AtomicBool>);

impl ListenerGuard {
    fn acquire(running: &Arc<AtomicBool>) -> Option<Self> {
        if running.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(running.clone()))
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Find the characteristic a notification belongs to.
///
/// btleplug notifications only carry the characteristic UUID. Subscribed characteristics are
/// searched first, which tells apart same-UUID characteristics of different services as long as
/// only one of them is subscribed.
fn resolve_notification(
    uuid: &Uuid,
    subscribed: &[Characteristic],
    known: &BTreeSet<Characteristic>,
) -> Option<GattCharacteristic> {
    subscribed
        .iter()
        .find(|c| c.uuid == *uuid)
        .or_else(|| known.iter().find(|c| c.uuid == *uuid))
        .map(GattCharacteristic::from)
}

/// State shared between the handle and its spawned tasks.
struct Shared {
    peripheral: Peripheral,
    callback: GattCallback,
    reporter: LinkStateReporter,
    listener: Arc<AtomicBool>,
    subscribed: Mutex<Vec<Characteristic>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(tokio::spawn(task));
    }
}

/// Forward value notifications unless a listener is already running.
fn start_notifications(shared: &Arc<Shared>) {
    let Some(guard) = ListenerGuard::acquire(&shared.listener) else {
        return;
    };

    let listener = shared.clone();
    shared.spawn(async move {
        let _guard = guard;
        let shared = listener;

        let mut notifications = match shared.peripheral.notifications().await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to get notifications stream: {}", e);
                return;
            }
        };

        debug!("Notification listener entering main loop");

        while let Some(notification) = notifications.next().await {
            trace!(
                "Notification received from {}: {} bytes",
                notification.uuid,
                notification.value.len()
            );

            let characteristic = resolve_notification(
                &notification.uuid,
                &shared.subscribed.lock(),
                &shared.peripheral.characteristics(),
            );

            match characteristic {
                Some(characteristic) => {
                    shared
                        .callback
                        .on_characteristic_changed(characteristic.with_value(notification.value));
                }
                None => debug!("Notification from unknown characteristic {}", notification.uuid),
            }
        }

        debug!("Notification listener stopped");
    });
}

/// Live link to a btleplug peripheral.
struct BtleplugHandle {
    shared: Arc<Shared>,
}

impl BtleplugHandle {
    fn find_characteristic(&self, characteristic: &GattCharacteristic) -> Option<Characteristic> {
        let found = self
            .shared
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| {
                c.uuid == characteristic.uuid && c.service_uuid == characteristic.service_uuid
            });

        if found.is_none() {
            debug!(
                "Characteristic {} NOT found in discovered characteristics",
                characteristic.uuid
            );
        }

        found
    }

    /// Report remote disconnections seen by the adapter.
    fn watch_disconnections(&self, adapter: Adapter) {
        let id = self.shared.peripheral.id();
        let shared = self.shared.clone();

        self.shared.spawn(async move {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(disconnected) = event {
                    if disconnected == id {
                        debug!("Device disconnected: {:?}", disconnected);
                        shared.reporter.report_lost();
                    }
                }
            }

            debug!("Adapter event stream ended");
        });
    }
}

impl GattHandle for BtleplugHandle {
    fn connect(&self) -> bool {
        self.shared
            .reporter
            .report(GattStatus::SUCCESS, STATE_CONNECTING);

        let shared = self.shared.clone();
        self.shared.spawn(async move {
            match shared.peripheral.connect().await {
                Ok(()) => {
                    info!("Connected to {:?}", shared.peripheral.id());
                    start_notifications(&shared);
                    shared.reporter.transition(
                        &[STATE_CONNECTING],
                        GattStatus::SUCCESS,
                        STATE_CONNECTED,
                    );
                }
                Err(e) => {
                    warn!("Connection attempt failed: {}", e);
                    shared.reporter.transition(
                        &[STATE_CONNECTING],
                        status_for(&e),
                        STATE_DISCONNECTED,
                    );
                }
            }
        });

        true
    }

    fn disconnect(&self) -> bool {
        self.shared
            .reporter
            .report(GattStatus::SUCCESS, STATE_DISCONNECTING);

        let shared = self.shared.clone();
        self.shared.spawn(async move {
            match shared.peripheral.disconnect().await {
                Ok(()) => {
                    info!("Disconnected from {:?}", shared.peripheral.id());
                    shared.reporter.report_lost();
                }
                Err(e) => {
                    error!("Failed to disconnect: {}", e);
                    let state = if shared.peripheral.is_connected().await.unwrap_or(false) {
                        STATE_CONNECTED
                    } else {
                        STATE_DISCONNECTED
                    };
                    shared
                        .reporter
                        .transition(&[STATE_DISCONNECTING], status_for(&e), state);
                }
            }
        });

        true
    }

    fn close(&self) {
        for task in self.shared.tasks.lock().drain(..) {
            task.abort();
        }
    }

    fn discover_services(&self) -> bool {
        let shared = self.shared.clone();

        self.shared.spawn(async move {
            match shared.peripheral.discover_services().await {
                Ok(()) => {
                    let services: Vec<GattService> = shared
                        .peripheral
                        .services()
                        .iter()
                        .map(GattService::from)
                        .collect();
                    shared
                        .callback
                        .on_services_discovered(services, GattStatus::SUCCESS);
                }
                Err(e) => {
                    warn!("Failed to discover services: {}", e);
                    shared
                        .callback
                        .on_services_discovered(Vec::new(), status_for(&e));
                }
            }
        });

        true
    }

    fn request_mtu(&self, mtu: u16) -> bool {
        debug!("MTU negotiation is not exposed by btleplug (requested {})", mtu);
        false
    }

    fn read_remote_rssi(&self) -> bool {
        let shared = self.shared.clone();

        self.shared.spawn(async move {
            let callback = &shared.callback;
            match shared.peripheral.properties().await {
                Ok(Some(properties)) => match properties.rssi {
                    Some(rssi) => callback.on_read_remote_rssi(rssi, GattStatus::SUCCESS),
                    None => callback.on_read_remote_rssi(0, GattStatus::FAILURE),
                },
                Ok(None) => callback.on_read_remote_rssi(0, GattStatus::FAILURE),
                Err(e) => {
                    warn!("Failed to read RSSI: {}", e);
                    callback.on_read_remote_rssi(0, status_for(&e));
                }
            }
        });

        true
    }

    fn read_characteristic(&self, characteristic: &GattCharacteristic) -> bool {
        let Some(target) = self.find_characteristic(characteristic) else {
            return false;
        };

        let shared = self.shared.clone();
        let characteristic = characteristic.clone();

        self.shared.spawn(async move {
            match shared.peripheral.read(&target).await {
                Ok(data) => {
                    trace!("Read {} bytes from characteristic {}", data.len(), target.uuid);
                    shared.callback.on_characteristic_read(
                        characteristic.with_value(data),
                        GattStatus::SUCCESS,
                    );
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", target.uuid, e);
                    shared
                        .callback
                        .on_characteristic_read(characteristic, status_for(&e));
                }
            }
        });

        true
    }

    fn write_characteristic(&self, characteristic: &GattCharacteristic) -> bool {
        let Some(target) = self.find_characteristic(characteristic) else {
            return false;
        };

        let shared = self.shared.clone();
        let characteristic = characteristic.clone();

        self.shared.spawn(async move {
            let result = shared
                .peripheral
                .write(&target, &characteristic.value, characteristic.write_type)
                .await;

            match result {
                Ok(()) => {
                    trace!(
                        "Wrote {} bytes to characteristic {}",
                        characteristic.value.len(),
                        target.uuid
                    );
                    shared
                        .callback
                        .on_characteristic_write(characteristic, GattStatus::SUCCESS);
                }
                Err(e) => {
                    warn!("Failed to write {}: {}", target.uuid, e);
                    let status = status_for(&e);
                    shared.callback.on_characteristic_write(characteristic, status);
                }
            }
        });

        true
    }

    fn get_service(&self, uuid: &Uuid) -> Option<GattService> {
        self.shared
            .peripheral
            .services()
            .iter()
            .find(|s| s.uuid == *uuid)
            .map(GattService::from)
    }

    fn set_characteristic_notification(
        &self,
        characteristic: &GattCharacteristic,
        enable: bool,
    ) -> bool {
        let Some(target) = self.find_characteristic(characteristic) else {
            return false;
        };

        if !target
            .properties
            .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
        {
            warn!(
                "Characteristic {} does not support notifications, properties: {:?}",
                target.uuid, target.properties
            );
            return false;
        }

        let shared = self.shared.clone();

        self.shared.spawn(async move {
            let result = if enable {
                shared.peripheral.subscribe(&target).await
            } else {
                shared.peripheral.unsubscribe(&target).await
            };

            match result {
                Ok(()) => {
                    let mut subscribed = shared.subscribed.lock();
                    subscribed.retain(|c| *c != target);
                    if enable {
                        subscribed.push(target.clone());
                    }
                    debug!(
                        "Notifications for {} {}",
                        target.uuid,
                        if enable { "enabled" } else { "disabled" }
                    );
                }
                Err(e) => warn!("Failed to update notifications for {}: {}", target.uuid, e),
            }
        });

        true
    }
}

impl Drop for BtleplugHandle {
    fn drop(&mut self) {
        self.close();
    }
}
