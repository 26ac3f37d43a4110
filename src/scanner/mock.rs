//! Mock backend: a few virtual RuuviTags broadcasting format 5 data.
//!
//! Useful for running the gateway and its destinations on a machine without
//! a Bluetooth adapter.

use super::ADVERTISEMENT_CHANNEL_BUFFER_SIZE;
use crate::advertisement::RawAdvertisement;
use crate::decoder::RUUVI_MANUFACTURER_ID;
use crate::mac_address::MacAddress;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// A simulated tag.
#[derive(Debug, Clone, Copy)]
struct VirtualTag {
    mac: MacAddress,
    name: &'static str,
    base_temperature: f64,
    base_humidity: f64,
}

const VIRTUAL_TAGS: [VirtualTag; 3] = [
    VirtualTag {
        mac: MacAddress([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01]),
        name: "Mock Living Room",
        base_temperature: 21.5,
        base_humidity: 40.0,
    },
    VirtualTag {
        mac: MacAddress([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x02]),
        name: "Mock Sauna",
        base_temperature: 80.0,
        base_humidity: 10.0,
    },
    VirtualTag {
        mac: MacAddress([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x03]),
        name: "Mock Freezer",
        base_temperature: -18.0,
        base_humidity: 70.0,
    },
];

/// Build a format 5 payload (without company ID) for `tag` at step `sequence`.
fn format5_payload(tag: &VirtualTag, sequence: u16) -> Vec<u8> {
    // slow triangle wave of +-0.5 °C
    let phase = f64::from(sequence % 20);
    let wobble = (phase - 10.0).abs() / 10.0 - 0.5;

    let temperature = ((tag.base_temperature + wobble) * 200.0).round() as i16;
    let humidity = (tag.base_humidity * 400.0).round() as u16;
    let pressure: u16 = 51_325; // 101 325 Pa
    let battery_mv: u16 = 3_000 - 1_600;
    let tx_power: u16 = (4 + 40) / 2;
    let power_info = (battery_mv << 5) | tx_power;

    let mut payload = Vec::with_capacity(24);
    payload.push(0x05);
    payload.extend_from_slice(&temperature.to_be_bytes());
    payload.extend_from_slice(&humidity.to_be_bytes());
    payload.extend_from_slice(&pressure.to_be_bytes());
    for axis in [0i16, 0, 1000] {
        payload.extend_from_slice(&axis.to_be_bytes());
    }
    payload.extend_from_slice(&power_info.to_be_bytes());
    payload.push((sequence / 10 % 255) as u8);
    payload.extend_from_slice(&(sequence % 0xFFFF).to_be_bytes());
    payload.extend_from_slice(&tag.mac.0);
    payload
}

fn advertisement(tag: &VirtualTag, sequence: u16) -> RawAdvertisement {
    let mut manufacturer_data = RUUVI_MANUFACTURER_ID.to_le_bytes().to_vec();
    manufacturer_data.extend(format5_payload(tag, sequence));
    RawAdvertisement {
        address: tag.mac,
        rssi: Some(-60 - 5 * i16::from((sequence % 3) as u8)),
        local_name: Some(tag.name.to_string()),
        manufacturer_data,
    }
}

/// Emit one advertisement per virtual tag every `period`, until the receiver is dropped.
pub fn start_scan(period: Duration) -> mpsc::Receiver<RawAdvertisement> {
    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence: u16 = 0;

        loop {
            ticker.tick().await;
            for tag in &VIRTUAL_TAGS {
                if tx.send(advertisement(tag, sequence)).await.is_err() {
                    debug!("mock scanner receiver dropped, stopping");
                    return;
                }
            }
            sequence = sequence.wrapping_add(1);
        }
    });

    rx
}
