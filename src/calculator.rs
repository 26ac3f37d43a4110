//! Derived environmental quantities.
//!
//! Every derivation is independent and only runs when all of its inputs are
//! present; a missing input leaves the derived field `None`.

use crate::measurement::{DerivedValues, Measurement, SensorValues};

/// Saturation vapor pressure at 0 °C, Pa.
const E0_PA: f64 = 611.2;
const MAGNUS_B: f64 = 17.67;
const MAGNUS_C: f64 = 243.5;
const KELVIN_OFFSET: f64 = 273.15;
/// Density of dry air at 0 °C and 101 300 Pa, kg/m3.
const DRY_AIR_DENSITY: f64 = 1.2929;
const REFERENCE_PRESSURE_PA: f64 = 101_300.0;

/// Total acceleration magnitude in g.
pub fn acceleration_total(x: f64, y: f64, z: f64) -> f64 {
    (x * x + y * y + z * z).sqrt()
}

/// Angle between the acceleration vector and one axis, in degrees.
///
/// Returns `None` for a zero total, where the angle is undefined.
pub fn acceleration_angle(axis: f64, total: f64) -> Option<f64> {
    if total == 0.0 {
        return None;
    }
    // clamp guards against |axis| marginally exceeding total through rounding
    Some((axis / total).clamp(-1.0, 1.0).acos().to_degrees())
}

/// Equilibrium (saturation) vapor pressure over water in Pa, Magnus form.
pub fn equilibrium_vapor_pressure(temperature: f64) -> f64 {
    E0_PA * (MAGNUS_B * temperature / (MAGNUS_C + temperature)).exp()
}

/// Absolute humidity in g/m3.
pub fn absolute_humidity(temperature: f64, humidity: f64) -> f64 {
    equilibrium_vapor_pressure(temperature) * humidity * 0.021674 / (KELVIN_OFFSET + temperature)
}

/// Dew point in °C.
///
/// Undefined for completely dry air: a relative humidity of 0 % (or below)
/// gives `None`.
pub fn dew_point(temperature: f64, humidity: f64) -> Option<f64> {
    let v = (humidity / 100.0 * equilibrium_vapor_pressure(temperature) / E0_PA).ln();
    Some(-MAGNUS_C * v / (v - MAGNUS_B)).filter(|dp| dp.is_finite())
}

/// Air density in kg/m3. Without a humidity reading the air is treated as dry.
pub fn air_density(temperature: f64, humidity: Option<f64>, pressure: f64) -> f64 {
    let vapor = humidity
        .map(|rh| 0.3783 * rh / 100.0 * equilibrium_vapor_pressure(temperature))
        .unwrap_or(0.0);
    DRY_AIR_DENSITY * KELVIN_OFFSET / (temperature + KELVIN_OFFSET) * (pressure - vapor)
        / REFERENCE_PRESSURE_PA
}

/// Compute every derived value whose prerequisites are present in `values`.
pub fn derive(values: &SensorValues) -> DerivedValues {
    let mut derived = DerivedValues::default();

    if let (Some(x), Some(y), Some(z)) = (
        values.acceleration_x,
        values.acceleration_y,
        values.acceleration_z,
    ) {
        let total = acceleration_total(x, y, z);
        derived.acceleration_total = Some(total);
        derived.acceleration_angle_from_x = acceleration_angle(x, total);
        derived.acceleration_angle_from_y = acceleration_angle(y, total);
        derived.acceleration_angle_from_z = acceleration_angle(z, total);
    }

    if let Some(t) = values.temperature {
        if let Some(rh) = values.humidity {
            derived.equilibrium_vapor_pressure = Some(equilibrium_vapor_pressure(t));
            derived.absolute_humidity = Some(absolute_humidity(t, rh));
            derived.dew_point = dew_point(t, rh);
        }
        if let Some(p) = values.pressure {
            derived.air_density = Some(air_density(t, values.humidity, p));
        }
    }

    derived
}

/// Return `measurement` with its derived values recomputed from its sensor values.
pub fn augment(mut measurement: Measurement) -> Measurement {
    measurement.derived = derive(&measurement.values);
    measurement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DataFormat;
    use crate::test_utils::{TEST_MAC, v5_measurement};
    use approx::assert_relative_eq;
    use std::time::UNIX_EPOCH;

    fn values(temperature: Option<f64>, humidity: Option<f64>, pressure: Option<f64>) -> SensorValues {
        let mut values = SensorValues::empty(DataFormat::V5);
        values.temperature = temperature;
        values.humidity = humidity;
        values.pressure = pressure;
        values
    }

    #[test]
    fn test_temperature_and_humidity_without_pressure() {
        let derived = derive(&values(Some(20.0), Some(50.0), None));
        assert_relative_eq!(derived.absolute_humidity.unwrap(), 8.6391, max_relative = 1e-4);
        assert_relative_eq!(derived.dew_point.unwrap(), 9.2701, max_relative = 1e-4);
        assert_relative_eq!(
            derived.equilibrium_vapor_pressure.unwrap(),
            2336.95,
            max_relative = 1e-5
        );
        assert_eq!(derived.air_density, None);
        assert_eq!(derived.acceleration_total, None);
    }

    #[test]
    fn test_vapor_pressure_at_zero_is_reference() {
        assert_eq!(equilibrium_vapor_pressure(0.0), E0_PA);
    }

    #[test]
    fn test_dew_point_equals_temperature_at_saturation() {
        assert_relative_eq!(dew_point(15.0, 100.0).unwrap(), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_humidity_has_no_dew_point() {
        assert_eq!(dew_point(20.0, 0.0), None);

        let derived = derive(&values(Some(20.0), Some(0.0), Some(100_000.0)));
        assert_eq!(derived.dew_point, None);
        assert_eq!(derived.absolute_humidity, Some(0.0));
        assert!(derived.equilibrium_vapor_pressure.unwrap().is_finite());
        assert!(derived.air_density.unwrap().is_finite());
    }

    #[test]
    fn test_air_density_dry_and_humid() {
        let dry = air_density(0.0, None, 101_300.0);
        assert_relative_eq!(dry, DRY_AIR_DENSITY, epsilon = 1e-12);

        let humid = air_density(25.0, Some(60.0), 100_000.0);
        assert!(humid < air_density(25.0, None, 100_000.0));
        assert_relative_eq!(humid, 1.1609, max_relative = 1e-4);
    }

    #[test]
    fn test_air_density_needs_temperature_and_pressure() {
        let derived = derive(&values(None, Some(40.0), Some(100_000.0)));
        assert_eq!(derived.air_density, None);
        assert_eq!(derived.dew_point, None);

        let derived = derive(&values(Some(10.0), None, Some(100_000.0)));
        assert!(derived.air_density.is_some());
        assert_eq!(derived.absolute_humidity, None);
        assert_eq!(derived.equilibrium_vapor_pressure, None);
    }

    #[test]
    fn test_acceleration_derivations() {
        let mut v = values(None, None, None);
        v.acceleration_x = Some(0.0);
        v.acceleration_y = Some(0.0);
        v.acceleration_z = Some(1.0);
        let derived = derive(&v);
        assert_eq!(derived.acceleration_total, Some(1.0));
        assert_relative_eq!(derived.acceleration_angle_from_x.unwrap(), 90.0);
        assert_relative_eq!(derived.acceleration_angle_from_y.unwrap(), 90.0);
        assert_relative_eq!(derived.acceleration_angle_from_z.unwrap(), 0.0);
    }

    #[test]
    fn test_zero_acceleration_has_no_angles() {
        let mut v = values(None, None, None);
        v.acceleration_x = Some(0.0);
        v.acceleration_y = Some(0.0);
        v.acceleration_z = Some(0.0);
        let derived = derive(&v);
        assert_eq!(derived.acceleration_total, Some(0.0));
        assert_eq!(derived.acceleration_angle_from_x, None);
        assert_eq!(derived.acceleration_angle_from_z, None);
    }

    #[test]
    fn test_missing_axis_skips_acceleration() {
        let mut v = values(None, None, None);
        v.acceleration_x = Some(0.5);
        v.acceleration_y = Some(0.5);
        assert_eq!(derive(&v).acceleration_total, None);
    }

    #[test]
    fn test_more_inputs_never_remove_derived_fields() {
        let sparse = derive(&values(Some(20.0), None, None));
        let rich = derive(&values(Some(20.0), Some(50.0), Some(101_325.0)));
        let present = |d: &DerivedValues| {
            [
                d.absolute_humidity,
                d.dew_point,
                d.equilibrium_vapor_pressure,
                d.air_density,
            ]
            .iter()
            .filter(|v| v.is_some())
            .count()
        };
        assert_eq!(present(&sparse), 0);
        assert_eq!(present(&rich), 4);
    }

    #[test]
    fn test_augment_keeps_sensor_values() {
        let measurement = v5_measurement(TEST_MAC, UNIX_EPOCH);
        let augmented = augment(measurement.clone());
        assert_eq!(augmented.values, measurement.values);
        assert!(augmented.derived.acceleration_total.is_some());
        assert!(augmented.derived.air_density.is_some());
        assert!(augmented.derived.dew_point.is_some());
    }
}
