//! BlueZ D-Bus backend for RuuviTag scanning.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.
//!
//! The advertisement monitor is registered with a Ruuvi manufacturer-data
//! pattern, so this backend only ever reports Ruuvi advertisements.

use super::{
    ADVERTISEMENT_CHANNEL_BUFFER_SIZE, MANUFACTURER_DATA_TYPE, RUUVI_MANUFACTURER_ID_BYTES,
    ScanError,
};
use crate::advertisement::RawAdvertisement;
use crate::decoder::RUUVI_MANUFACTURER_ID;
use crate::mac_address::MacAddress;
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start scanning for RuuviTag devices using the BlueZ D-Bus backend.
///
/// This function initializes the Bluetooth adapter `hci{hci_index}` and
/// registers an advertisement monitor for Ruuvi manufacturer data.
/// Advertisements are sent through the returned channel until the receiver
/// is dropped.
pub async fn start_scan(hci_index: u16) -> Result<mpsc::Receiver<RawAdvertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.adapter(&format!("hci{hci_index}"))?;
    adapter.set_powered(true).await?;
    info!(adapter = adapter.name(), "scanning with BlueZ");

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    // Create a pattern to filter for Ruuvi manufacturer data
    let pattern = Pattern {
        data_type: MANUFACTURER_DATA_TYPE,
        start_position: 0,
        content: RUUVI_MANUFACTURER_ID_BYTES.to_vec(),
    };

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(vec![pattern]),
            ..Default::default()
        })
        .await?;

    // Spawn a task that owns all Bluetooth state and runs the event loop
    tokio::spawn(async move {
        // Keep all Bluetooth state alive by moving it into this task
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            let MonitorEvent::DeviceFound(device_id) = event else {
                continue;
            };
            match read_advertisement(&adapter, device_id.device).await {
                Ok(Some(advertisement)) => {
                    if tx.send(advertisement).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(error) => debug!(%error, "failed to read device properties"),
            }
        }
        debug!("BlueZ monitor stream ended");
    });

    Ok(rx)
}

/// Read the advertised properties of a discovered device.
///
/// Returns `Ok(None)` when the device carries no Ruuvi manufacturer data.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> Result<Option<RawAdvertisement>, ScanError> {
    let device = adapter.device(address)?;

    let Some(manufacturer_data) = device.manufacturer_data().await? else {
        return Ok(None);
    };
    let Some(ruuvi_data) = manufacturer_data.get(&RUUVI_MANUFACTURER_ID) else {
        return Ok(None);
    };

    let mut data = RUUVI_MANUFACTURER_ID.to_le_bytes().to_vec();
    data.extend_from_slice(ruuvi_data);

    Ok(Some(RawAdvertisement {
        address: MacAddress::from(address),
        rssi: device.rssi().await?,
        local_name: device.name().await?,
        manufacturer_data: data,
    }))
}
