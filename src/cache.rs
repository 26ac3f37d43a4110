//! In-memory cache of the latest reading from every tag heard.

use crate::mac_address::MacAddress;
use crate::measurement::{DerivedValues, Measurement, SensorValues, unix_millis};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

/// The last known state of one tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRecord {
    pub mac: MacAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
    /// Timestamp of the measurement that last updated this record
    #[serde(serialize_with = "unix_millis")]
    pub last_seen: SystemTime,
    #[serde(flatten)]
    pub values: SensorValues,
    #[serde(flatten)]
    pub derived: DerivedValues,
}

impl TagRecord {
    fn from_measurement(measurement: &Measurement) -> Self {
        Self {
            mac: measurement.mac,
            name: measurement.name.clone(),
            rssi: measurement.rssi,
            last_seen: measurement.timestamp,
            values: measurement.values.clone(),
            derived: measurement.derived.clone(),
        }
    }
}

/// Latest [`TagRecord`] per device.
///
/// Many readers or one writer at a time; a reader never observes a record
/// that is only partly updated.
#[derive(Debug, Default)]
pub struct TagCache {
    records: RwLock<HashMap<MacAddress, TagRecord>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for `measurement.mac`.
    ///
    /// The signal strength and air-quality index of the previous record are
    /// kept when the new measurement does not carry them.
    pub fn update(&self, measurement: &Measurement) {
        let mut record = TagRecord::from_measurement(measurement);
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = records.get(&measurement.mac) {
            record.rssi = record.rssi.or(previous.rssi);
            record.values.air_quality_index = record
                .values
                .air_quality_index
                .or(previous.values.air_quality_index);
        }
        records.insert(measurement.mac, record);
    }

    pub fn get(&self, mac: &MacAddress) -> Option<TagRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mac)
            .cloned()
    }

    /// Snapshot of every record, ordered by address.
    pub fn list_all(&self) -> Vec<TagRecord> {
        let mut all: Vec<TagRecord> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|record| record.mac);
        all
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
