//! RuuviTag measurement data structures.
//!
//! A [`Measurement`] is built once per accepted radio event and then copied to
//! every destination. It is split into three parts:
//! - identity (address, signal strength, display name, timestamp),
//! - [`SensorValues`], the device-intrinsic fields produced by the decoder,
//! - [`DerivedValues`], the quantities computed by [`crate::calculator`].
//!
//! All values are in SI-ish units:
//! - Temperature and dew point in Celsius
//! - Humidity in percent (0-100)
//! - Pressure and vapor pressure in Pascals
//! - Battery voltage in Volts
//! - TX power and RSSI in dBm
//! - Acceleration in g (standard gravity), angles in degrees
//! - Particulate matter in micrograms per cubic meter (ug/m3)
//! - CO2 in parts per million (ppm)
//! - VOC/NOx indexes are unitless scores
//! - Illuminance in lux, sound levels in dBA
//! - Absolute humidity in g/m3, air density in kg/m3

use crate::decoder::DataFormat;
use crate::mac_address::MacAddress;
use serde::{Serialize, Serializer};
use std::time::{SystemTime, UNIX_EPOCH};

/// Serialize a wall-clock timestamp as unix milliseconds.
pub(crate) fn unix_millis<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    serializer.serialize_u64(millis)
}

/// Fields decoded directly from an advertisement payload.
///
/// Absence (`None`) means "not carried by this format or not available in this
/// reading", never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorValues {
    /// Wire format that produced this reading
    pub data_format: DataFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_counter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm1_0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm2_5: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm4_0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10_0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub co2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voc_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nox_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub illuminance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_instant: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_peak: Option<f64>,
    /// Supplied from outside the beacon payload; the decoder never sets it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_quality_index: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_in_progress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_pressed_on_boot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtc_running_on_boot: Option<bool>,
}

impl SensorValues {
    /// Values for the given format with every field absent.
    pub fn empty(data_format: DataFormat) -> Self {
        Self {
            data_format,
            temperature: None,
            humidity: None,
            pressure: None,
            battery_voltage: None,
            tx_power: None,
            movement_counter: None,
            measurement_sequence: None,
            acceleration_x: None,
            acceleration_y: None,
            acceleration_z: None,
            pm1_0: None,
            pm2_5: None,
            pm4_0: None,
            pm10_0: None,
            co2: None,
            voc_index: None,
            nox_index: None,
            illuminance: None,
            sound_instant: None,
            sound_average: None,
            sound_peak: None,
            air_quality_index: None,
            calibration_in_progress: None,
            button_pressed_on_boot: None,
            rtc_running_on_boot: None,
        }
    }
}

/// Secondary quantities computed from [`SensorValues`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_angle_from_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_angle_from_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_angle_from_z: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absolute_humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dew_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equilibrium_vapor_pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_density: Option<f64>,
}

/// A measurement from a RuuviTag sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// MAC address of the RuuviTag
    pub mac: MacAddress,
    /// Wall-clock time the advertisement was dispatched
    #[serde(serialize_with = "unix_millis")]
    pub timestamp: SystemTime,
    /// Received signal strength in dBm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i16>,
    /// Display name: operator alias, else advertised local name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub values: SensorValues,
    #[serde(flatten)]
    pub derived: DerivedValues,
}

impl Measurement {
    /// Wrap decoded values with identity; derived values start empty.
    pub fn new(mac: MacAddress, timestamp: SystemTime, values: SensorValues) -> Self {
        Self {
            mac,
            timestamp,
            rssi: None,
            name: None,
            values,
            derived: DerivedValues::default(),
        }
    }
}
