//! Data format E1 (Extended v1).
//!
//! | Offset | Field                                                     |
//! |--------|-----------------------------------------------------------|
//! | 1-6    | temperature, humidity, pressure                           |
//! | 7-14   | PM1.0, PM2.5, PM4.0, PM10.0, 0.1 ug/m3 each               |
//! | 15-16  | CO2, ppm                                                  |
//! | 17     | VOC index, high 8 of 9 bits                               |
//! | 18     | NOx index, high 8 of 9 bits                               |
//! | 19-21  | illuminance, 0.01 lux                                     |
//! | 22-24  | sound instant/average/peak, high 8 of 9 bits, 18 + 0.2 dBA |
//! | 25-27  | measurement sequence, 24 bits                             |
//! | 28     | flags, see below                                          |
//! | 29-33  | reserved                                                  |
//! | 34-39  | MAC address (ignored)                                     |
//!
//! Flag bits: 0 calibration in progress, 1 button pressed on boot, 2 RTC
//! running on boot, 3/4/5 sound instant/average/peak LSB, 6 NOx LSB, 7 VOC LSB.

use super::{DataFormat, Frame, PM_DIVISOR, decode_environment};
use crate::measurement::SensorValues;

const FLAGS: usize = 28;
const SOUND_OFFSET_DBA: f64 = 18.0;
/// Sound resolution is 0.2 dBA.
const SOUND_DIVISOR: f64 = 5.0;

pub(super) fn decode(frame: &Frame<'_>) -> SensorValues {
    let mut values = SensorValues::empty(DataFormat::E1);
    decode_environment(frame, &mut values);

    let pm = |offset: usize| frame.unsigned(offset, 2).map(|raw| f64::from(raw) / PM_DIVISOR);
    values.pm1_0 = pm(7);
    values.pm2_5 = pm(9);
    values.pm4_0 = pm(11);
    values.pm10_0 = pm(13);
    values.co2 = frame.unsigned(15, 2).map(f64::from);
    values.voc_index = frame.nine_bit(17, FLAGS, 7).map(f64::from);
    values.nox_index = frame.nine_bit(18, FLAGS, 6).map(f64::from);
    values.illuminance = frame.unsigned(19, 3).map(|raw| f64::from(raw) / 100.0);

    let sound = |offset: usize, lsb: u8| {
        frame
            .nine_bit(offset, FLAGS, lsb)
            .map(|raw| SOUND_OFFSET_DBA + f64::from(raw) / SOUND_DIVISOR)
    };
    values.sound_instant = sound(22, 3);
    values.sound_average = sound(23, 4);
    values.sound_peak = sound(24, 5);

    values.measurement_sequence = frame.unsigned(25, 3);
    values.calibration_in_progress = frame.flag(FLAGS, 0);
    values.button_pressed_on_boot = frame.flag(FLAGS, 1);
    values.rtc_running_on_boot = frame.flag(FLAGS, 2);
    values
}
