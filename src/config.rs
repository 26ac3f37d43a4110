//! Gateway configuration: an optional TOML file merged with command-line options.
//!
//! ```toml
//! all_advertisements = false
//! backend = "hci"
//! hci_index = 0
//! enabled_tags = ["AA:BB:CC:DD:EE:FF"]
//!
//! [tag_names]
//! "AA:BB:CC:DD:EE:FF" = "Sauna"
//!
//! [logging]
//! level = "info"
//! format = "text"
//!
//! [[destination]]
//! name = "telegraf"
//! kind = "influxdb"
//! minimum_interval = "10s"
//! output = "stdout"
//! measurement = "ruuvi_measurement"
//! additional_tags = { site = "cabin" }
//! ```

use crate::alias::{self, AliasMap};
use crate::app::Options;
use crate::destination::DEFAULT_QUEUE_CAPACITY;
use crate::destination::sink::OutputTarget;
use crate::dispatcher::DispatchRules;
use crate::logging::{LogFormat, LoggingSettings};
use crate::mac_address::{MacAddress, ParseMacError};
use crate::output::OutputFormat;
use crate::output::influxdb::DEFAULT_MEASUREMENT_NAME;
use crate::scanner::Backend;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid tag address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: ParseMacError,
    },
    #[error("destination {destination:?}: {reason}")]
    InvalidDuration { destination: String, reason: String },
    #[error("invalid alias: {0}")]
    InvalidAlias(String),
    #[error("destination {0:?}: queue_capacity must be at least 1")]
    InvalidQueueCapacity(String),
    #[error("unknown log level {0:?}")]
    UnknownLogLevel(String),
    #[error("unknown backend {0:?}")]
    UnknownBackend(String),
}

/// Parse a duration from a human-readable string.
///
/// Supports the following suffixes:
/// - `s` or no suffix: seconds
/// - `m`: minutes
/// - `h`: hours
/// - `ms`: milliseconds
///
/// # Arguments
/// * `src` - A string like "3s", "1m", "500ms", or "30"
///
/// # Returns
/// A Result containing the parsed Duration or an error message.
///
/// # Examples
/// ```
/// use ruuvi_gateway::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();

    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    let number = |num: &str, unit: &str| -> Result<u64, String> {
        num.trim()
            .parse()
            .map_err(|_| format!("invalid {unit}: {num}"))
    };
    let scaled = |value: u64, factor: u64| -> Result<Duration, String> {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration too large: {src}"))
    };

    // "ms" must be tried before "m" and "s"
    if let Some(num) = src.strip_suffix("ms") {
        return Ok(Duration::from_millis(number(num, "milliseconds")?));
    }
    if let Some(num) = src.strip_suffix('h') {
        return scaled(number(num, "hours")?, 3600);
    }
    if let Some(num) = src.strip_suffix('m') {
        return scaled(number(num, "minutes")?, 60);
    }
    if let Some(num) = src.strip_suffix('s') {
        return Ok(Duration::from_secs(number(num, "seconds")?));
    }

    // No suffix, treat as seconds
    Ok(Duration::from_secs(number(src, "duration")?))
}

/// A duration as written in the config file: integer seconds or a suffixed string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl Default for DurationValue {
    fn default() -> Self {
        DurationValue::Seconds(0)
    }
}

impl DurationValue {
    pub fn to_duration(&self) -> Result<Duration, String> {
        match self {
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration(text),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_measurement() -> String {
    DEFAULT_MEASUREMENT_NAME.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[logging]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// One `[[destination]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    pub name: String,
    #[serde(default)]
    pub kind: OutputFormat,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub minimum_interval: DurationValue,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub output: OutputTarget,
    /// InfluxDB measurement name
    #[serde(default = "default_measurement")]
    pub measurement: String,
    /// Extra InfluxDB tags on every point
    #[serde(default)]
    pub additional_tags: BTreeMap<String, String>,
}

/// The config file as written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Forward advertisements regardless of manufacturer ID
    pub all_advertisements: bool,
    pub backend: Option<String>,
    pub hci_index: Option<u16>,
    /// Address to display name
    pub tag_names: BTreeMap<String, String>,
    /// Allow-list of addresses; empty forwards every tag
    pub enabled_tags: Vec<String>,
    pub logging: LoggingConfig,
    #[serde(rename = "destination")]
    pub destinations: Vec<DestinationConfig>,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A destination ready to be built.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationSettings {
    pub name: String,
    pub format: OutputFormat,
    pub minimum_interval: Duration,
    pub queue_capacity: usize,
    pub output: OutputTarget,
    pub measurement: String,
    pub additional_tags: BTreeMap<String, String>,
}

impl DestinationSettings {
    fn from_config(config: DestinationConfig) -> Result<Self, ConfigError> {
        let minimum_interval =
            config
                .minimum_interval
                .to_duration()
                .map_err(|reason| ConfigError::InvalidDuration {
                    destination: config.name.clone(),
                    reason,
                })?;
        if config.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(config.name));
        }
        Ok(Self {
            name: config.name,
            format: config.kind,
            minimum_interval,
            queue_capacity: config.queue_capacity,
            output: config.output,
            measurement: config.measurement,
            additional_tags: config.additional_tags,
        })
    }

    /// The single stdout destination used when the file configures none.
    fn from_options(options: &Options) -> Self {
        Self {
            name: "stdout".to_string(),
            format: options.format,
            minimum_interval: options.throttle.unwrap_or(Duration::ZERO),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output: OutputTarget::Stdout,
            measurement: options.influxdb_measurement.clone(),
            additional_tags: BTreeMap::new(),
        }
    }
}

/// Fully resolved settings for one gateway run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: Backend,
    pub hci_index: u16,
    pub rules: DispatchRules,
    pub logging: LoggingSettings,
    /// Enabled destinations in configuration order
    pub destinations: Vec<DestinationSettings>,
}

fn parse_address(address: &str) -> Result<MacAddress, ConfigError> {
    address
        .parse()
        .map_err(|source| ConfigError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

fn parse_level(level: &str) -> Result<Level, ConfigError> {
    level
        .trim()
        .parse()
        .map_err(|_| ConfigError::UnknownLogLevel(level.to_string()))
}

impl Settings {
    /// Load the file named by `--config`, if any, and merge `options` over it.
    pub fn load(options: &Options) -> Result<Self, ConfigError> {
        let file = match &options.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Self::merge(file, options)
    }

    /// Merge command-line options over a parsed config file.
    ///
    /// Scalars given on the command line replace the file's; aliases and
    /// allow-list entries extend it. Without any `[[destination]]` entry a
    /// stdout destination is built from the output options.
    pub fn merge(file: FileConfig, options: &Options) -> Result<Self, ConfigError> {
        let backend = match (options.backend, &file.backend) {
            (Some(backend), _) => backend,
            (None, Some(name)) => name
                .parse()
                .map_err(|_| ConfigError::UnknownBackend(name.clone()))?,
            (None, None) => Backend::default(),
        };

        let mut aliases = AliasMap::new();
        for (address, name) in &file.tag_names {
            let alias = alias::parse_alias(&format!("{address}={name}"))
                .map_err(ConfigError::InvalidAlias)?;
            aliases.insert(alias.address, alias.name);
        }
        aliases.extend(alias::to_map(&options.aliases));

        let mut enabled_tags = file
            .enabled_tags
            .iter()
            .map(|address| parse_address(address))
            .collect::<Result<BTreeSet<_>, _>>()?;
        enabled_tags.extend(options.enabled_tags.iter().copied());

        let mut level = match &options.log_level {
            Some(level) => parse_level(level)?,
            None => parse_level(&file.logging.level)?,
        };
        // Level orders TRACE as the greatest
        if options.verbose && level < Level::DEBUG {
            level = Level::DEBUG;
        }

        let destinations = if file.destinations.is_empty() {
            vec![DestinationSettings::from_options(options)]
        } else {
            file.destinations
                .into_iter()
                .filter(|d| d.enabled)
                .map(DestinationSettings::from_config)
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            backend,
            hci_index: options.hci_index.or(file.hci_index).unwrap_or(0),
            rules: DispatchRules {
                all_advertisements: options.all_advertisements || file.all_advertisements,
                aliases,
                enabled_tags,
            },
            logging: LoggingSettings {
                level,
                format: options.log_format.unwrap_or(file.logging.format),
            },
            destinations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{OTHER_MAC, TEST_MAC};
    use clap::Parser;

    fn options(args: &[&str]) -> Options {
        Options::parse_from(std::iter::once("ruuvi-gateway").chain(args.iter().copied()))
    }

    fn parse(toml: &str) -> FileConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("0s").unwrap(), Duration::from_secs(0));
    }

    #[test]
    fn test_parse_duration_minutes_and_hours() {
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(
            parse_duration("1000ms").unwrap(),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_parse_duration_no_suffix_and_whitespace() {
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("3 s").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration(&format!("{}h", u64::MAX)).is_err());
    }

    #[test]
    fn test_empty_file_gives_stdout_destination() {
        let settings = Settings::merge(FileConfig::default(), &options(&[])).unwrap();
        assert_eq!(settings.hci_index, 0);
        assert!(!settings.rules.all_advertisements);
        assert!(settings.rules.enabled_tags.is_empty());
        assert_eq!(settings.logging, LoggingSettings::default());
        assert_eq!(settings.destinations.len(), 1);

        let stdout = &settings.destinations[0];
        assert_eq!(stdout.name, "stdout");
        assert_eq!(stdout.format, OutputFormat::Influxdb);
        assert_eq!(stdout.output, OutputTarget::Stdout);
        assert_eq!(stdout.minimum_interval, Duration::ZERO);
        assert_eq!(stdout.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(stdout.measurement, "ruuvi_measurement");
    }

    #[test]
    fn test_cli_output_options_shape_default_destination() {
        let settings = Settings::merge(
            FileConfig::default(),
            &options(&[
                "--format",
                "json",
                "--throttle",
                "10s",
                "--influxdb-measurement",
                "tags",
            ]),
        )
        .unwrap();
        let stdout = &settings.destinations[0];
        assert_eq!(stdout.format, OutputFormat::Json);
        assert_eq!(stdout.minimum_interval, Duration::from_secs(10));
        assert_eq!(stdout.measurement, "tags");
    }

    #[test]
    fn test_full_file() {
        let file = parse(
            r#"
            all_advertisements = true
            backend = "mock"
            hci_index = 1
            enabled_tags = ["aabbccddeeff"]

            [tag_names]
            "AA:BB:CC:DD:EE:FF" = "Sauna"

            [logging]
            level = "warn"
            format = "json"

            [[destination]]
            name = "telegraf"
            kind = "influxdb"
            minimum_interval = "1m"
            additional_tags = { site = "cabin" }

            [[destination]]
            name = "archive"
            kind = "json"
            minimum_interval = 5
            queue_capacity = 16
            output = "/var/log/ruuvi.jsonl"

            [[destination]]
            name = "disabled"
            enabled = false
            "#,
        );
        let settings = Settings::merge(file, &options(&[])).unwrap();

        assert_eq!(settings.backend, Backend::Mock);
        assert_eq!(settings.hci_index, 1);
        assert!(settings.rules.all_advertisements);
        assert!(settings.rules.enabled_tags.contains(&TEST_MAC));
        assert_eq!(settings.rules.aliases.get(&TEST_MAC).map(String::as_str), Some("Sauna"));
        assert_eq!(settings.logging.level, Level::WARN);
        assert_eq!(settings.logging.format, LogFormat::Json);

        let names: Vec<&str> = settings.destinations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["telegraf", "archive"]);

        let telegraf = &settings.destinations[0];
        assert_eq!(telegraf.minimum_interval, Duration::from_secs(60));
        assert_eq!(telegraf.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(telegraf.additional_tags.get("site").map(String::as_str), Some("cabin"));

        let archive = &settings.destinations[1];
        assert_eq!(archive.format, OutputFormat::Json);
        assert_eq!(archive.minimum_interval, Duration::from_secs(5));
        assert_eq!(archive.queue_capacity, 16);
        assert_eq!(archive.output, OutputTarget::File("/var/log/ruuvi.jsonl".into()));
    }

    #[test]
    fn test_cli_overrides_and_extends_file() {
        let file = parse(
            r#"
            backend = "definitely-not-a-backend"
            hci_index = 1
            enabled_tags = ["AA:BB:CC:DD:EE:FF"]
            [tag_names]
            "AA:BB:CC:DD:EE:FF" = "Sauna"
            "#,
        );
        let settings = Settings::merge(
            file,
            &options(&[
                "--backend",
                "mock",
                "--hci-index",
                "2",
                "--alias",
                "AA:BB:CC:DD:EE:FF=Kitchen",
                "--enable-tag",
                "11:22:33:44:55:66",
                "--all-advertisements",
            ]),
        )
        .unwrap();

        assert_eq!(settings.backend, Backend::Mock);
        assert_eq!(settings.hci_index, 2);
        assert!(settings.rules.all_advertisements);
        assert_eq!(settings.rules.aliases.get(&TEST_MAC).map(String::as_str), Some("Kitchen"));
        assert_eq!(
            settings.rules.enabled_tags,
            BTreeSet::from([TEST_MAC, OTHER_MAC])
        );
    }

    #[test]
    fn test_log_level_resolution() {
        let file = parse("[logging]\nlevel = \"error\"");
        let settings = Settings::merge(file.clone(), &options(&["-v"])).unwrap();
        assert_eq!(settings.logging.level, Level::DEBUG);

        let settings = Settings::merge(file.clone(), &options(&["--log-level", "trace", "-v"])).unwrap();
        assert_eq!(settings.logging.level, Level::TRACE);

        let settings = Settings::merge(file, &options(&["--log-level", "WARN"])).unwrap();
        assert_eq!(settings.logging.level, Level::WARN);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = Settings::merge(parse("enabled_tags = [\"nope\"]"), &options(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { .. }));

        let err = Settings::merge(parse("[tag_names]\n\"xyz\" = \"Sauna\""), &options(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAlias(_)));

        let err = Settings::merge(parse("backend = \"carrier-pigeon\""), &options(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(_)));

        let err = Settings::merge(parse("[logging]\nlevel = \"loud\""), &options(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownLogLevel(_)));

        let err = Settings::merge(
            parse("[[destination]]\nname = \"a\"\nminimum_interval = \"soon\""),
            &options(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));

        let err = Settings::merge(
            parse("[[destination]]\nname = \"a\"\nqueue_capacity = 0"),
            &options(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQueueCapacity(name) if name == "a"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("use_mock = true").is_err());
        assert!(toml::from_str::<FileConfig>("[[destination]]\nname = \"a\"\nurl = \"x\"").is_err());
    }

    #[test]
    fn test_read_errors() {
        let err = FileConfig::from_file("/nonexistent/ruuvi-gateway.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));

        let path = std::env::temp_dir().join(format!("ruuvi-gateway-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "hci_index = \"zero\"").unwrap();
        let err = FileConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        std::fs::remove_file(&path).unwrap();
    }
}
