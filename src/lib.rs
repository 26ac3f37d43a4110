//! `ruuvi-gateway` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing and process exit codes.
//! Each received advertisement goes through the [`dispatcher`]: decode, derive,
//! cache, allow-list, then a rate-limited, non-blocking hand-off to every
//! [`destination`]. [`crate::app`] wires a scanner, the dispatcher and the
//! destination consumers together so the whole loop can be tested with an
//! injected scanner and injected output streams.

pub mod advertisement;
pub mod alias;
pub mod app;
pub mod cache;
pub mod calculator;
pub mod config;
pub mod decoder;
pub mod destination;
pub mod dispatcher;
pub mod logging;
pub mod mac_address;
pub mod measurement;
pub mod output;
pub mod rate_gate;
pub mod scanner;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use advertisement::RawAdvertisement;
pub use alias::{Alias, AliasMap, parse_alias, to_map};
pub use cache::{TagCache, TagRecord};
pub use config::{Settings, parse_duration};
pub use decoder::{DataFormat, DecodeError, decode};
pub use destination::{Destination, DestinationId, QueueDestination};
pub use dispatcher::{DispatchOutcome, DispatchRules, Dispatcher};
pub use mac_address::MacAddress;
pub use measurement::{DerivedValues, Measurement, SensorValues};
pub use output::OutputFormatter;
pub use output::influxdb::InfluxDbFormatter;
pub use output::json::JsonFormatter;
pub use rate_gate::RateGate;
pub use scanner::{Backend, ScanError};
