//! JSON lines output formatter.

use crate::measurement::Measurement;
use crate::output::{FormatError, OutputFormatter};

/// Formats each measurement as a single-line JSON object.
///
/// Keys are snake_case field names and absent values are omitted. `mac` is the
/// upper-case, colon-separated address (`AA:BB:CC:DD:EE:FF`), `timestamp` is in
/// unix milliseconds and `data_format` is the numeric format tag.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, measurement: &Measurement) -> Result<String, FormatError> {
        Ok(serde_json::to_string(measurement)?)
    }
}
