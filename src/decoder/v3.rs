//! Data format 3 (RAWv1).
//!
//! | Offset | Field                                                      |
//! |--------|------------------------------------------------------------|
//! | 1      | humidity, 0.5 % steps                                      |
//! | 2      | temperature integer part, bit 7 is the sign                |
//! | 3      | temperature fraction, 1/100 °C                             |
//! | 4-5    | pressure, Pa with -50 000 offset                           |
//! | 6-11   | acceleration X/Y/Z, i16 milli-g                            |
//! | 12-13  | battery, mV                                                |

use super::{DataFormat, Frame, PRESSURE_OFFSET_PA};
use crate::measurement::SensorValues;

pub(super) fn decode(frame: &Frame<'_>) -> SensorValues {
    let mut values = SensorValues::empty(DataFormat::V3);

    values.humidity = frame.unsigned(1, 1).map(|raw| f64::from(raw) / 2.0);
    values.temperature = temperature(frame);
    values.pressure = frame
        .unsigned(4, 2)
        .map(|raw| f64::from(raw) + PRESSURE_OFFSET_PA);

    let axis = |i: usize| frame.signed16(6 + 2 * i).map(|mg| f64::from(mg) / 1000.0);
    values.acceleration_x = axis(0);
    values.acceleration_y = axis(1);
    values.acceleration_z = axis(2);

    values.battery_voltage = frame.unsigned(12, 2).map(|mv| f64::from(mv) / 1000.0);
    values
}

/// Sign-magnitude integer byte plus a hundredths byte; a fraction above 99 is not a reading.
fn temperature(frame: &Frame<'_>) -> Option<f64> {
    let integer = frame.byte(2)?;
    let fraction = frame.byte(3).filter(|&f| f <= 99)?;
    let hundredths = f64::from(u16::from(integer & 0x7F) * 100 + u16::from(fraction));
    let sign = if integer & 0x80 != 0 { -1.0 } else { 1.0 };
    Some(sign * hundredths / 100.0)
}
