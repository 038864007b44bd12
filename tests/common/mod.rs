//! Scripted hardware used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use btleplug::api::CharPropFlags;
use parking_lot::Mutex;
use uuid::Uuid;

use gatt_link::ble::{
    uuid_from_u16, BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID, DEVICE_INFO_SERVICE_UUID,
    MANUFACTURER_NAME_UUID,
};
use gatt_link::gatt::state::{
    STATE_CONNECTED, STATE_CONNECTING, STATE_DISCONNECTED, STATE_DISCONNECTING,
};
use gatt_link::{
    ConnectOptions, GattCallback, GattCharacteristic, GattHandle, GattHardware, GattService,
    GattStatus,
};

/// Vendor characteristic that notifies alongside the battery level.
pub const TEMPERATURE_UUID: Uuid = uuid_from_u16(0x2a6e);

pub fn battery_level() -> GattCharacteristic {
    GattCharacteristic::new(
        BATTERY_LEVEL_UUID,
        BATTERY_SERVICE_UUID,
        CharPropFlags::READ | CharPropFlags::NOTIFY,
    )
}

pub fn temperature() -> GattCharacteristic {
    GattCharacteristic::new(
        TEMPERATURE_UUID,
        BATTERY_SERVICE_UUID,
        CharPropFlags::READ | CharPropFlags::WRITE | CharPropFlags::NOTIFY,
    )
}

pub fn manufacturer_name() -> GattCharacteristic {
    GattCharacteristic::new(
        MANUFACTURER_NAME_UUID,
        DEVICE_INFO_SERVICE_UUID,
        CharPropFlags::READ,
    )
}

pub fn services() -> Vec<GattService> {
    vec![
        GattService {
            uuid: BATTERY_SERVICE_UUID,
            primary: true,
            characteristics: vec![battery_level(), temperature()],
        },
        GattService {
            uuid: DEVICE_INFO_SERVICE_UUID,
            primary: true,
            characteristics: vec![manufacturer_name()],
        },
    ]
}

struct Inner {
    callback: Mutex<Option<GattCallback>>,
    accept: AtomicBool,
    respond: AtomicBool,
    latency: Mutex<Duration>,
    status: Mutex<GattStatus>,
    rssi: Mutex<i16>,
    values: Mutex<HashMap<Uuid, Bytes>>,
    submissions: Mutex<Vec<&'static str>>,
    connect_gatt_calls: AtomicUsize,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
}

/// Peripheral that answers every accepted request after a fixed latency.
#[derive(Clone)]
pub struct FakePeripheral {
    inner: Arc<Inner>,
}

impl Default for FakePeripheral {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePeripheral {
    pub fn new() -> Self {
        let values = HashMap::from([
            (BATTERY_LEVEL_UUID, Bytes::from_static(&[87])),
            (TEMPERATURE_UUID, Bytes::from_static(&[0x10, 0x09])),
            (MANUFACTURER_NAME_UUID, Bytes::from_static(b"Acme")),
        ]);

        Self {
            inner: Arc::new(Inner {
                callback: Mutex::new(None),
                accept: AtomicBool::new(true),
                respond: AtomicBool::new(true),
                latency: Mutex::new(Duration::from_millis(20)),
                status: Mutex::new(GattStatus::SUCCESS),
                rssi: Mutex::new(-58),
                values: Mutex::new(values),
                submissions: Mutex::new(Vec::new()),
                connect_gatt_calls: AtomicUsize::new(0),
                outstanding: AtomicUsize::new(0),
                max_outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Accept or reject every following submission.
    pub fn set_accept(&self, accept: bool) {
        self.inner.accept.store(accept, Ordering::SeqCst);
    }

    /// Answer accepted requests, or swallow them.
    pub fn set_respond(&self, respond: bool) {
        self.inner.respond.store(respond, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    /// Status reported by the following command responses.
    pub fn set_status(&self, status: GattStatus) {
        *self.inner.status.lock() = status;
    }

    pub fn set_rssi(&self, rssi: i16) {
        *self.inner.rssi.lock() = rssi;
    }

    pub fn submissions(&self) -> Vec<&'static str> {
        self.inner.submissions.lock().clone()
    }

    pub fn connect_gatt_calls(&self) -> usize {
        self.inner.connect_gatt_calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were awaiting a response at once.
    pub fn max_outstanding(&self) -> usize {
        self.inner.max_outstanding.load(Ordering::SeqCst)
    }

    /// Push a value change for `characteristic`.
    pub fn notify(&self, characteristic: GattCharacteristic, value: &'static [u8]) {
        if let Some(callback) = self.inner.callback.lock().as_ref() {
            callback.on_characteristic_changed(characteristic.with_value(value));
        }
    }

    /// Simulate the peer dropping the link.
    pub fn drop_link(&self) {
        if let Some(callback) = self.inner.callback.lock().as_ref() {
            callback.on_connection_state_change(GattStatus::SUCCESS, STATE_DISCONNECTED);
        }
    }

    fn callback(&self) -> Option<GattCallback> {
        self.inner.callback.lock().clone()
    }

    /// Record a submission and schedule its answer.
    fn submit<F>(&self, name: &'static str, answer: F) -> bool
    where
        F: FnOnce(&GattCallback, GattStatus) + Send + 'static,
    {
        self.inner.submissions.lock().push(name);

        if !self.inner.accept.load(Ordering::SeqCst) {
            return false;
        }
        if !self.inner.respond.load(Ordering::SeqCst) {
            return true;
        }
        let Some(callback) = self.callback() else {
            return false;
        };

        let outstanding = self.inner.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_outstanding
            .fetch_max(outstanding, Ordering::SeqCst);

        let inner = self.inner.clone();
        let latency = *self.inner.latency.lock();
        let status = *self.inner.status.lock();

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            inner.outstanding.fetch_sub(1, Ordering::SeqCst);
            answer(&callback, status);
        });

        true
    }

    fn value_of(&self, uuid: &Uuid) -> Bytes {
        self.inner
            .values
            .lock()
            .get(uuid)
            .cloned()
            .unwrap_or_default()
    }
}

impl GattHardware for FakePeripheral {
    fn connect_gatt(
        &self,
        _options: ConnectOptions,
        callback: GattCallback,
    ) -> Option<Arc<dyn GattHandle>> {
        self.inner.connect_gatt_calls.fetch_add(1, Ordering::SeqCst);
        *self.inner.callback.lock() = Some(callback);

        if !GattHandle::connect(self) {
            return None;
        }

        Some(Arc::new(self.clone()))
    }
}

impl GattHandle for FakePeripheral {
    fn connect(&self) -> bool {
        let accepted = self.submit("connect", |callback, status| {
            let state = if status.is_success() {
                STATE_CONNECTED
            } else {
                STATE_DISCONNECTED
            };
            callback.on_connection_state_change(status, state);
        });

        if accepted {
            if let Some(callback) = self.callback() {
                callback.on_connection_state_change(GattStatus::SUCCESS, STATE_CONNECTING);
            }
        }

        accepted
    }

    fn disconnect(&self) -> bool {
        let accepted = self.submit("disconnect", |callback, _| {
            callback.on_connection_state_change(GattStatus::SUCCESS, STATE_DISCONNECTED);
        });

        if accepted {
            if let Some(callback) = self.callback() {
                callback.on_connection_state_change(GattStatus::SUCCESS, STATE_DISCONNECTING);
            }
        }

        accepted
    }

    fn close(&self) {
        self.inner.callback.lock().take();
    }

    fn discover_services(&self) -> bool {
        self.submit("discover_services", |callback, status| {
            callback.on_services_discovered(services(), status);
        })
    }

    fn request_mtu(&self, mtu: u16) -> bool {
        self.submit("request_mtu", move |callback, status| {
            callback.on_mtu_changed(mtu.min(247), status);
        })
    }

    fn read_remote_rssi(&self) -> bool {
        let rssi = *self.inner.rssi.lock();
        self.submit("read_remote_rssi", move |callback, status| {
            callback.on_read_remote_rssi(rssi, status);
        })
    }

    fn read_characteristic(&self, characteristic: &GattCharacteristic) -> bool {
        let read = characteristic.clone().with_value(self.value_of(&characteristic.uuid));
        self.submit("read_characteristic", move |callback, status| {
            callback.on_characteristic_read(read, status);
        })
    }

    fn write_characteristic(&self, characteristic: &GattCharacteristic) -> bool {
        let written = characteristic.clone();
        let inner = self.inner.clone();
        self.submit("write_characteristic", move |callback, status| {
            if status.is_success() {
                inner
                    .values
                    .lock()
                    .insert(written.uuid, written.value.clone());
            }
            callback.on_characteristic_write(written, status);
        })
    }

    fn get_service(&self, uuid: &Uuid) -> Option<GattService> {
        services().into_iter().find(|s| s.uuid == *uuid)
    }

    fn set_characteristic_notification(
        &self,
        characteristic: &GattCharacteristic,
        _enable: bool,
    ) -> bool {
        self.inner.submissions.lock().push("set_characteristic_notification");
        characteristic.can_notify()
    }
}
