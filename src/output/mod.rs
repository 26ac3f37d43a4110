//! Output formatters for RuuviTag measurements.
//!
//! This module provides a trait for formatting measurements and implementations
//! for the supported line-oriented formats: InfluxDB line protocol and JSON lines.

pub mod influxdb;
pub mod json;

use crate::measurement::Measurement;
use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

/// A measurement that could not be rendered; the sink skips it.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("failed to serialize measurement: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for formatting measurements into output strings.
///
/// Implementations of this trait convert a `Measurement` into a single line,
/// without the trailing newline, suitable for a specific output format.
pub trait OutputFormatter: Send + Sync {
    /// Format a measurement.
    ///
    /// # Arguments
    /// * `measurement` - The measurement data to format (includes timestamp)
    ///
    /// # Returns
    /// A formatted string representation of the measurement
    ///
    /// # Errors
    /// Returns a [`FormatError`] when the measurement cannot be rendered
    fn format(&self, measurement: &Measurement) -> Result<String, FormatError>;
}

/// Selectable output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// InfluxDB line protocol
    #[default]
    Influxdb,
    /// One JSON object per line
    Json,
}
