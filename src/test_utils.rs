use crate::advertisement::RawAdvertisement;
use crate::decoder::{self, RUUVI_MANUFACTURER_ID};
use crate::mac_address::MacAddress;
use crate::measurement::Measurement;
use std::time::SystemTime;

/// A stable MAC address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// A second device, for tests that need two tags.
pub const OTHER_MAC: MacAddress = MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// Decode a hex string (no separators) into bytes.
pub fn hex(src: &str) -> Vec<u8> {
    assert!(src.len() % 2 == 0, "odd hex length: {src}");
    (0..src.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&src[i..i + 2], 16).unwrap())
        .collect()
}

/// The official format 5 "valid data" test vector.
pub fn v5_payload() -> Vec<u8> {
    hex("0512FC5394C37C0004FFFC040CAC364200CDCBB8334C884F")
}

/// A format 6 frame: 29.5 °C, 55.3 %, 101102 Pa, PM2.5 11.2, CO2 201,
/// VOC 10, NOx 2, illuminance code 217, sequence 205.
pub fn v6_payload() -> Vec<u8> {
    hex("06170C5668C79E007000C90501D9FFCD004C884F")
}

/// A format E1 frame with every field available and all flags clear.
pub fn e1_payload() -> Vec<u8> {
    let mut payload = hex("E1170C5668C79E");
    payload.extend(hex("0065007004BD11CA")); // PM1.0/2.5/4.0/10.0
    payload.extend(hex("00C9")); // CO2
    payload.extend(hex("0A02")); // VOC, NOx high bits
    payload.extend(hex("13E0AC")); // illuminance 13027.00 lux
    payload.extend(hex("492D7D")); // sound high bits
    payload.extend(hex("DECDEE")); // sequence
    payload.push(0x00); // flags
    payload.extend(hex("FFFFFFFFFF")); // reserved
    payload.extend(hex("CBB8334C884F"));
    assert_eq!(payload.len(), 40);
    payload
}

/// Prefix a decoder payload with the Ruuvi manufacturer ID, little-endian.
pub fn manufacturer_data(payload: &[u8]) -> Vec<u8> {
    let mut data = RUUVI_MANUFACTURER_ID.to_le_bytes().to_vec();
    data.extend_from_slice(payload);
    data
}

/// A Ruuvi advertisement from `mac` carrying `payload`.
pub fn advertisement(mac: MacAddress, payload: &[u8]) -> RawAdvertisement {
    RawAdvertisement {
        address: mac,
        rssi: Some(-70),
        local_name: None,
        manufacturer_data: manufacturer_data(payload),
    }
}

/// Decode the format 5 test vector into a `Measurement` for `mac`.
pub fn v5_measurement(mac: MacAddress, timestamp: SystemTime) -> Measurement {
    let values = decoder::decode(&v5_payload()).unwrap();
    Measurement::new(mac, timestamp, values)
}

/// A cloneable in-memory writer, for sinks that must be `Send + 'static`.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl std::io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
