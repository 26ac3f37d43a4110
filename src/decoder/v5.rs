//! Data format 5 (RAWv2) and its cut-down variant C5.
//!
//! | Offset (5) | Offset (C5) | Field                                          |
//! |------------|-------------|------------------------------------------------|
//! | 1-6        | 1-6         | temperature, humidity, pressure                |
//! | 7-12       | -           | acceleration X/Y/Z, i16 milli-g                |
//! | 13-14      | 7-8         | 11 bits battery (+1600 mV), 5 bits tx (-40 + 2n dBm) |
//! | 15         | 9           | movement counter                               |
//! | 16-17      | 10-11       | measurement sequence                           |
//! | 18-23      | 12-17       | MAC address (ignored)                          |

use super::{DataFormat, Frame, decode_environment};
use crate::measurement::SensorValues;

const BATTERY_UNAVAILABLE: u32 = 0x7FF;
const TX_POWER_UNAVAILABLE: u32 = 0x1F;
const BATTERY_OFFSET_MV: f64 = 1600.0;

/// Offsets of the fields that follow the environment block.
struct Layout {
    acceleration: Option<usize>,
    power_info: usize,
    movement_counter: usize,
    sequence: usize,
}

const RAW_V2: Layout = Layout {
    acceleration: Some(7),
    power_info: 13,
    movement_counter: 15,
    sequence: 16,
};

const CUT_DOWN: Layout = Layout {
    acceleration: None,
    power_info: 7,
    movement_counter: 9,
    sequence: 10,
};

pub(super) fn decode(frame: &Frame<'_>) -> SensorValues {
    decode_layout(frame, DataFormat::V5, &RAW_V2)
}

pub(super) fn decode_cut_down(frame: &Frame<'_>) -> SensorValues {
    decode_layout(frame, DataFormat::C5, &CUT_DOWN)
}

fn decode_layout(frame: &Frame<'_>, format: DataFormat, layout: &Layout) -> SensorValues {
    let mut values = SensorValues::empty(format);
    decode_environment(frame, &mut values);

    if let Some(offset) = layout.acceleration {
        let axis = |i: usize| frame.signed16(offset + 2 * i).map(|mg| f64::from(mg) / 1000.0);
        values.acceleration_x = axis(0);
        values.acceleration_y = axis(1);
        values.acceleration_z = axis(2);
    }

    if let Some(power) = frame.raw(layout.power_info, 2) {
        let battery = power >> 5;
        let tx = power & 0x1F;
        values.battery_voltage = (battery != BATTERY_UNAVAILABLE)
            .then(|| (f64::from(battery) + BATTERY_OFFSET_MV) / 1000.0);
        values.tx_power = (tx != TX_POWER_UNAVAILABLE).then(|| -40 + 2 * tx as i8);
    }

    values.movement_counter = frame.unsigned(layout.movement_counter, 1);
    values.measurement_sequence = frame.unsigned(layout.sequence, 2);
    values
}
