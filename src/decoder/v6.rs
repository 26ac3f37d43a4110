//! Data format 6 (Ruuvi Air).
//!
//! | Offset | Field                                                    |
//! |--------|----------------------------------------------------------|
//! | 1-6    | temperature, humidity, pressure                          |
//! | 7-8    | PM2.5, 0.1 ug/m3                                         |
//! | 9-10   | CO2, ppm                                                 |
//! | 11     | VOC index, high 8 of 9 bits                              |
//! | 12     | NOx index, high 8 of 9 bits                              |
//! | 13     | illuminance, logarithmic code                            |
//! | 14     | reserved                                                 |
//! | 15     | measurement sequence, 8 bits                             |
//! | 16     | flags: b0 calibration, b6 NOx LSB, b7 VOC LSB            |
//! | 17-19  | lowest 3 bytes of the MAC address (ignored)              |

use super::{DataFormat, Frame, PM_DIVISOR, decode_environment};
use crate::measurement::SensorValues;

const FLAGS: usize = 16;

/// Decode the logarithmic illuminance code: 0..=254 maps onto 0..=65535 lux.
fn illuminance(code: u8) -> f64 {
    let step = 65_536f64.ln() / 254.0;
    (f64::from(code) * step).exp() - 1.0
}

pub(super) fn decode(frame: &Frame<'_>) -> SensorValues {
    let mut values = SensorValues::empty(DataFormat::V6);
    decode_environment(frame, &mut values);

    values.pm2_5 = frame.unsigned(7, 2).map(|raw| f64::from(raw) / PM_DIVISOR);
    values.co2 = frame.unsigned(9, 2).map(f64::from);
    values.voc_index = frame.nine_bit(11, FLAGS, 7).map(f64::from);
    values.nox_index = frame.nine_bit(12, FLAGS, 6).map(f64::from);
    values.illuminance = frame.unsigned(13, 1).map(|code| illuminance(code as u8));
    values.measurement_sequence = frame.byte(15).map(u32::from);
    values.calibration_in_progress = frame.flag(FLAGS, 0);
    values
}
