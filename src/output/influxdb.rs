//! InfluxDB line protocol output formatter.

use crate::measurement::Measurement;
use crate::output::{FormatError, OutputFormatter};
use std::collections::BTreeMap;
use std::fmt;
#[cfg(test)]
use std::time::Duration;
use std::time::SystemTime;

/// Measurement name used when none is configured.
pub const DEFAULT_MEASUREMENT_NAME: &str = "ruuvi_measurement";

/// Field values for InfluxDB line protocol
#[derive(Debug, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(num) => write!(f, "{num}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Escape a tag key or value: commas, equals signs and spaces.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape a measurement name: commas and spaces.
fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

/// Data point in InfluxDB line protocol
#[derive(Debug)]
pub struct DataPoint {
    pub measurement: String,
    pub tag_set: BTreeMap<String, String>,
    pub field_set: BTreeMap<String, FieldValue>,
    pub timestamp: Option<SystemTime>,
}

fn fmt_tags(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    for (key, value) in data_point.tag_set.iter() {
        write!(fmt, ",{}={}", escape_tag(key), escape_tag(value))?;
    }
    Ok(())
}

fn fmt_fields(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    let mut first = true;
    for (key, value) in data_point.field_set.iter() {
        if first {
            first = false;
        } else {
            write!(fmt, ",")?;
        }
        write!(fmt, "{}={}", escape_tag(key), value)?;
    }
    Ok(())
}

fn fmt_timestamp(data_point: &DataPoint, fmt: &mut fmt::Formatter) -> fmt::Result {
    // a clock before the epoch leaves the point to be stamped by the server
    if let Some(Ok(since_epoch)) = data_point
        .timestamp
        .map(|time| time.duration_since(SystemTime::UNIX_EPOCH))
    {
        write!(fmt, " {}", since_epoch.as_nanos())?;
    }
    Ok(())
}

impl fmt::Display for DataPoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", escape_measurement(&self.measurement))?;
        fmt_tags(self, fmt)?;
        write!(fmt, " ")?;
        fmt_fields(self, fmt)?;
        fmt_timestamp(self, fmt)
    }
}

/// InfluxDB line protocol formatter.
///
/// Formats measurements according to the InfluxDB line protocol specification,
/// in the shape Telegraf's RuuviTag inputs use: humidity as a fraction and
/// pressure in kPa. Every measurement carries `mac` and `name` tags plus any
/// configured extra tags.
pub struct InfluxDbFormatter {
    /// The measurement name in InfluxDB
    measurement_name: String,
    /// Static tags added to every point
    additional_tags: BTreeMap<String, String>,
}

impl InfluxDbFormatter {
    /// Convert humidity from percent (0-100) to fraction (0-1).
    #[inline]
    fn humidity_fraction(percent: f64) -> f64 {
        percent / 100.0
    }

    /// Convert pressure from Pascals to kilopascals.
    #[inline]
    fn pressure_kpa(pascals: f64) -> f64 {
        pascals / 1000.0
    }

    /// Create a new InfluxDB formatter.
    ///
    /// # Arguments
    /// * `measurement_name` - The measurement name to use in the line protocol
    /// * `additional_tags` - Tags written on every point; `mac` and `name` win on conflict
    pub fn new(measurement_name: String, additional_tags: BTreeMap<String, String>) -> Self {
        Self {
            measurement_name,
            additional_tags,
        }
    }

    /// Build the tag set for InfluxDB line protocol.
    ///
    /// The `name` tag falls back to the MAC address when the tag has no display name.
    fn tag_set(&self, measurement: &Measurement) -> BTreeMap<String, String> {
        let mut tags = self.additional_tags.clone();
        let address = measurement.mac.to_string();
        let name = measurement.name.clone().unwrap_or_else(|| address.clone());
        tags.insert("mac".to_string(), address);
        tags.insert("name".to_string(), name);
        tags
    }

    /// Build the field set for InfluxDB line protocol.
    ///
    /// Only includes fields that have values (None fields are omitted).
    /// Performs unit conversions as needed (humidity to fraction, pressure to kPa).
    fn field_set(&self, m: &Measurement) -> BTreeMap<String, FieldValue> {
        let mut fields = BTreeMap::new();
        let v = &m.values;
        let d = &m.derived;

        macro_rules! add {
            ($name:literal, $val:expr) => {
                // line protocol has no NaN or infinity
                if let Some(v) = $val.filter(|v: &f64| v.is_finite()) {
                    fields.insert($name.into(), FieldValue::Float(v));
                }
            };
        }
        macro_rules! flag {
            ($name:literal, $val:expr) => {
                if let Some(b) = $val {
                    fields.insert($name.into(), FieldValue::Boolean(b));
                }
            };
        }

        add!("data_format", Some(f64::from(v.data_format.tag())));
        add!("rssi", m.rssi.map(f64::from));
        add!("temperature", v.temperature);
        add!("humidity", v.humidity.map(Self::humidity_fraction));
        add!("pressure", v.pressure.map(Self::pressure_kpa));
        add!("battery_potential", v.battery_voltage);
        add!("tx_power", v.tx_power.map(f64::from));
        add!("movement_counter", v.movement_counter.map(f64::from));
        add!(
            "measurement_sequence_number",
            v.measurement_sequence.map(f64::from)
        );
        add!("acceleration_x", v.acceleration_x);
        add!("acceleration_y", v.acceleration_y);
        add!("acceleration_z", v.acceleration_z);
        add!("pm1_0", v.pm1_0);
        add!("pm2_5", v.pm2_5);
        add!("pm4_0", v.pm4_0);
        add!("pm10_0", v.pm10_0);
        add!("co2", v.co2);
        add!("voc_index", v.voc_index);
        add!("nox_index", v.nox_index);
        add!("illuminance", v.illuminance);
        add!("sound_instant", v.sound_instant);
        add!("sound_average", v.sound_average);
        add!("sound_peak", v.sound_peak);
        add!("air_quality_index", v.air_quality_index);
        flag!("calibration_in_progress", v.calibration_in_progress);
        flag!("button_pressed_on_boot", v.button_pressed_on_boot);
        flag!("rtc_running_on_boot", v.rtc_running_on_boot);

        add!("acceleration_total", d.acceleration_total);
        add!("acceleration_angle_from_x", d.acceleration_angle_from_x);
        add!("acceleration_angle_from_y", d.acceleration_angle_from_y);
        add!("acceleration_angle_from_z", d.acceleration_angle_from_z);
        add!("absolute_humidity", d.absolute_humidity);
        add!("dew_point", d.dew_point);
        add!("equilibrium_vapor_pressure", d.equilibrium_vapor_pressure);
        add!("air_density", d.air_density);

        fields
    }

    fn to_data_point(&self, measurement: &Measurement) -> DataPoint {
        DataPoint {
            measurement: self.measurement_name.clone(),
            tag_set: self.tag_set(measurement),
            field_set: self.field_set(measurement),
            timestamp: Some(measurement.timestamp),
        }
    }
}

impl Default for InfluxDbFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MEASUREMENT_NAME.to_string(), BTreeMap::new())
    }
}

impl OutputFormatter for InfluxDbFormatter {
    fn format(&self, measurement: &Measurement) -> Result<String, FormatError> {
        Ok(self.to_data_point(measurement).to_string())
    }
}
