//! Read the Device Information Service of a nearby peripheral and watch its battery level.
//!
//! Run with: cargo run --example read_device_info -- --name <local name>

use btleplug::api::{Central, Peripheral as _, ScanFilter};
use futures::StreamExt;
use gatt_link::ble::{default_adapter, BATTERY_LEVEL_UUID, BATTERY_SERVICE_UUID};
use gatt_link::{
    BtleplugHardware, DeviceInformation, Error, GattController, GattLink, Phy, Result, Transport,
};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gatt_link=debug".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let target_name = args
        .iter()
        .position(|arg| arg == "--name")
        .and_then(|i| args.get(i + 1))
        .cloned();

    let adapter = default_adapter().await?;
    adapter.start_scan(ScanFilter::default()).await?;
    println!("Scanning for 5 seconds...\n");
    tokio::time::sleep(Duration::from_secs(5)).await;
    adapter.stop_scan().await?;

    let mut found = None;
    for peripheral in adapter.peripherals().await? {
        let name = peripheral
            .properties()
            .await?
            .and_then(|p| p.local_name)
            .unwrap_or_default();

        if target_name.as_ref().map_or(!name.is_empty(), |t| *t == name) {
            println!("Using {} ({})", name, peripheral.id());
            found = Some(peripheral);
            break;
        }
    }

    let Some(peripheral) = found else {
        println!("No matching peripheral found.");
        return Ok(());
    };

    let link = GattLink::new(BtleplugHardware::new(adapter, peripheral));
    link.connect(Transport::Le, Phy::LE_1M).await?;

    let services = link.discover_services().await?;
    println!("Discovered {} services", services.len());
    for service in &services {
        println!("  {} ({} characteristics)", service.uuid, service.characteristics.len());
    }

    match DeviceInformation::read(&link).await {
        Ok(info) => {
            println!("\n=== Device Information ===");
            println!("Manufacturer: {}", info.manufacturer_name.as_deref().unwrap_or("-"));
            println!("Model:        {}", info.model_number.as_deref().unwrap_or("-"));
            println!("Serial:       {}", info.serial_number.as_deref().unwrap_or("-"));
            println!("Hardware:     {}", info.hardware_revision.as_deref().unwrap_or("-"));
            println!("Firmware:     {}", info.firmware_revision.as_deref().unwrap_or("-"));
            println!("Software:     {}", info.software_revision.as_deref().unwrap_or("-"));
        }
        Err(Error::ServiceNotFound { .. }) => println!("\nNo Device Information Service"),
        Err(e) => return Err(e),
    }

    if let Ok(rssi) = link.read_rssi().await {
        println!("\nRSSI: {} dBm", rssi);
    }

    let level = link
        .get_service(&BATTERY_SERVICE_UUID)?
        .and_then(|s| s.characteristic(&BATTERY_LEVEL_UUID).cloned());

    if let Some(level) = level {
        let current = link.read_characteristic(&level).await?;
        println!("Battery: {}%", current.value.first().copied().unwrap_or(0));

        let mut updates = link.observe_characteristic(&level)?;
        println!("Watching battery level for 30 seconds...");

        let deadline = tokio::time::sleep(Duration::from_secs(30));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                Some(event) = updates.next() => {
                    println!(
                        "[{}] Battery: {}%",
                        event.received_at.format("%H:%M:%S"),
                        event.characteristic.value.first().copied().unwrap_or(0)
                    );
                }
            }
        }
    }

    link.disconnect().await?;
    println!("\nDisconnected.");
    Ok(())
}
