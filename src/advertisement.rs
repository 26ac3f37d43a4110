//! Radio events as delivered by a scanner backend.

use crate::mac_address::MacAddress;

/// One received BLE advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    /// Address of the advertising device
    pub address: MacAddress,
    /// Received signal strength in dBm, when the backend reports it
    pub rssi: Option<i16>,
    /// Advertised local name
    pub local_name: Option<String>,
    /// Manufacturer-specific data, starting with the little-endian company ID
    pub manufacturer_data: Vec<u8>,
}

impl RawAdvertisement {
    /// Company identifier from the first two bytes.
    pub fn vendor_id(&self) -> Option<u16> {
        match self.manufacturer_data.as_slice() {
            [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    /// Manufacturer data after the company identifier.
    pub fn payload(&self) -> &[u8] {
        self.manufacturer_data.get(2..).unwrap_or_default()
    }
}
