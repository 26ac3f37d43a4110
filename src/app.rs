//! Core application runner (business logic) for `ruuvi-gateway`.
//!
//! This module is intentionally decoupled from CLI parsing and process exit codes
//! so it can be tested deterministically.

use crate::advertisement::RawAdvertisement;
use crate::alias::Alias;
use crate::cache::TagCache;
use crate::config::{ConfigError, DestinationSettings, Settings};
use crate::destination::sink::{OutputSink, OutputTarget, spawn_consumer};
use crate::destination::{self, Destination};
use crate::dispatcher::Dispatcher;
use crate::logging::{LogFormat, LoggingError};
use crate::mac_address::MacAddress;
use crate::output::influxdb::{DEFAULT_MEASUREMENT_NAME, InfluxDbFormatter};
use crate::output::json::JsonFormatter;
use crate::output::{OutputFormat, OutputFormatter};
use crate::rate_gate::RateGate;
use crate::scanner::{Backend, ScanError};
use clap::Parser;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Command-line options. Anything given here overrides the config file.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// TOML config file with destinations, tag names and the allow-list
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = DEFAULT_MEASUREMENT_NAME)]
    pub influxdb_measurement: String,

    /// Specify human-readable alias for RuuviTag id.
    /// Format: --alias DE:AD:BE:EF:00:00=Sauna
    #[arg(long = "alias", value_parser = crate::alias::parse_alias, value_name = "ALIAS")]
    pub aliases: Vec<Alias>,

    /// Only forward measurements from this tag (repeatable).
    /// Without any, every tag is forwarded.
    #[arg(long = "enable-tag", value_name = "MAC")]
    pub enabled_tags: Vec<MacAddress>,

    /// Decode manufacturer data from every vendor, not only Ruuvi
    #[arg(long)]
    pub all_advertisements: bool,

    /// Verbose output, log parse errors for unrecognized data
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Throttle events per tag to at most one per interval.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, value_parser = crate::config::parse_duration)]
    pub throttle: Option<Duration>,

    /// Output format of the default stdout destination
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,

    /// Bluetooth scanner backend to use
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Bluetooth adapter index, 0 for hci0
    #[arg(long, value_name = "N")]
    pub hci_index: Option<u16>,

    /// Log level: error, warn, info, debug or trace. RUST_LOG takes precedence.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log line format on stderr
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Counters reported when the scanner stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Advertisements received from the scanner
    pub events: u64,
    /// Lines written, summed over all destinations
    pub written: u64,
    /// Distinct tags in the cache
    pub tags: usize,
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        hci_index: u16,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<RawAdvertisement>, ScanError>> + Send + '_>,
    >;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        hci_index: u16,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<RawAdvertisement>, ScanError>> + Send + '_>,
    > {
        Box::pin(async move { crate::scanner::start_scan(backend, hci_index).await })
    }
}

fn formatter(settings: &DestinationSettings) -> Box<dyn OutputFormatter> {
    match settings.format {
        OutputFormat::Influxdb => Box::new(InfluxDbFormatter::new(
            settings.measurement.clone(),
            settings.additional_tags.clone(),
        )),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    }
}

/// Run the gateway against the process's stdout.
pub async fn run(settings: Settings, scanner: &dyn Scanner) -> Result<RunSummary, RunError> {
    run_with_io(settings, scanner, || Box::new(io::stdout())).await
}

/// Run the gateway until the scanner's channel closes.
///
/// Every configured destination gets a bounded queue and a consumer task;
/// `stdout` opens the writer for destinations whose output is stdout. Once the
/// scanner stops, the queues are closed and the consumers drain what is left
/// before this returns.
pub async fn run_with_io<F>(
    settings: Settings,
    scanner: &dyn Scanner,
    stdout: F,
) -> Result<RunSummary, RunError>
where
    F: Fn() -> Box<dyn Write + Send>,
{
    let mut destinations: Vec<Box<dyn Destination>> = Vec::new();
    let mut consumers: Vec<(String, JoinHandle<u64>)> = Vec::new();
    for config in &settings.destinations {
        let writer = match &config.output {
            OutputTarget::Stdout => stdout(),
            target => target.open()?,
        };
        let (queue, receiver) = destination::channel(
            config.name.clone(),
            config.minimum_interval,
            config.queue_capacity,
        );
        let sink = OutputSink::new(formatter(config), writer);
        consumers.push((
            config.name.clone(),
            spawn_consumer(config.name.clone(), receiver, sink),
        ));
        destinations.push(Box::new(queue));
    }

    let cache = Arc::new(TagCache::new());
    let dispatcher = Dispatcher::new(
        settings.rules,
        Arc::clone(&cache),
        Arc::new(RateGate::new()),
        destinations,
    );

    let mut advertisements = scanner
        .start_scan(settings.backend, settings.hci_index)
        .await?;
    info!(
        backend = %settings.backend,
        destinations = dispatcher.destinations().len(),
        "listening for advertisements"
    );

    let mut summary = RunSummary::default();
    while let Some(advertisement) = advertisements.recv().await {
        summary.events += 1;
        dispatcher.dispatch(&advertisement);
    }

    // closes every queue so the consumers finish
    drop(dispatcher);
    for (name, consumer) in consumers {
        match consumer.await {
            Ok(written) => summary.written += written,
            Err(error) => warn!(destination = %name, %error, "destination consumer failed"),
        }
    }
    summary.tags = cache.len();
    info!(
        events = summary.events,
        written = summary.written,
        tags = summary.tags,
        "scanner stopped"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{OTHER_MAC, SharedBuffer, TEST_MAC, advertisement, v5_payload, v6_payload};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FakeScanner {
        advertisements: Mutex<Vec<RawAdvertisement>>,
        pace: Duration,
    }

    impl FakeScanner {
        fn new(advertisements: Vec<RawAdvertisement>) -> Self {
            Self::paced(advertisements, Duration::ZERO)
        }

        /// Emits one advertisement every `pace`, like a radio would.
        fn paced(advertisements: Vec<RawAdvertisement>, pace: Duration) -> Self {
            Self {
                advertisements: Mutex::new(advertisements),
                pace,
            }
        }
    }

    impl Scanner for FakeScanner {
        fn start_scan(
            &self,
            _backend: Backend,
            _hci_index: u16,
        ) -> Pin<
            Box<
                dyn Future<Output = Result<mpsc::Receiver<RawAdvertisement>, ScanError>>
                    + Send
                    + '_,
            >,
        > {
            let advertisements = self.advertisements.lock().unwrap().clone();
            let pace = self.pace;
            Box::pin(async move {
                let (tx, rx) = mpsc::channel::<RawAdvertisement>(advertisements.len().max(1));
                tokio::spawn(async move {
                    for adv in advertisements {
                        if !pace.is_zero() {
                            tokio::time::sleep(pace).await;
                        }
                        let _ = tx.send(adv).await;
                    }
                    // drop tx to close channel
                });
                Ok(rx)
            })
        }
    }

    struct FailingScanner;

    impl Scanner for FailingScanner {
        fn start_scan(
            &self,
            _backend: Backend,
            _hci_index: u16,
        ) -> Pin<
            Box<
                dyn Future<Output = Result<mpsc::Receiver<RawAdvertisement>, ScanError>>
                    + Send
                    + '_,
            >,
        > {
            Box::pin(async { Err(ScanError::Bluetooth("no adapter".to_string())) })
        }
    }

    /// Writer that takes `delay` to flush every line.
    #[derive(Clone)]
    struct SlowWriter {
        inner: SharedBuffer,
        delay: Duration,
    }

    impl Write for SlowWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            std::thread::sleep(self.delay);
            self.inner.flush()
        }
    }

    fn settings(args: &[&str]) -> Settings {
        let options = Options::parse_from(std::iter::once("ruuvi-gateway").chain(args.iter().copied()));
        Settings::merge(Default::default(), &options).unwrap()
    }

    #[tokio::test]
    async fn run_writes_measurements_to_out() {
        let scanner = FakeScanner::new(vec![advertisement(TEST_MAC, &v5_payload())]);
        let out = SharedBuffer::default();
        let writer = out.clone();

        let summary = run_with_io(
            settings(&["--alias", "AA:BB:CC:DD:EE:FF=Sauna"]),
            &scanner,
            move || Box::new(writer.clone()),
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                events: 1,
                written: 1,
                tags: 1
            }
        );

        let out = out.contents();
        assert!(out.starts_with("ruuvi_measurement,mac=AA:BB:CC:DD:EE:FF,name=Sauna "));
        assert!(out.contains("temperature=24.3"));
        assert!(out.ends_with('\n'));
    }

    #[tokio::test]
    async fn run_applies_throttle() {
        let adv = advertisement(TEST_MAC, &v5_payload());
        let scanner = FakeScanner::new(vec![adv.clone(), adv]);
        let out = SharedBuffer::default();
        let writer = out.clone();

        let summary = run_with_io(settings(&["--throttle", "1h"]), &scanner, move || {
            Box::new(writer.clone())
        })
        .await
        .unwrap();

        // only first should pass (no waiting in test, so second is within interval)
        assert_eq!(summary.events, 2);
        assert_eq!(out.contents().lines().count(), 1);
    }

    #[tokio::test]
    async fn run_skips_undecodable_and_disabled_tags() {
        let mut broken = advertisement(TEST_MAC, &v5_payload());
        broken.manufacturer_data.truncate(5);
        let scanner = FakeScanner::new(vec![
            broken,
            advertisement(OTHER_MAC, &v6_payload()),
            advertisement(TEST_MAC, &v6_payload()),
        ]);
        let out = SharedBuffer::default();
        let writer = out.clone();

        let summary = run_with_io(
            settings(&["--format", "json", "--enable-tag", "AABBCCDDEEFF"]),
            &scanner,
            move || Box::new(writer.clone()),
        )
        .await
        .unwrap();

        assert_eq!(summary.events, 3);
        assert_eq!(summary.tags, 2);
        let out = out.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 1);
        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["mac"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(json["data_format"], 6);
    }

    #[tokio::test]
    async fn run_keeps_ingesting_while_a_destination_is_slow() {
        let adv = advertisement(TEST_MAC, &v5_payload());
        let scanner = FakeScanner::paced(vec![adv; 20], Duration::from_millis(10));
        let out = SharedBuffer::default();
        let writer = SlowWriter {
            inner: out.clone(),
            delay: Duration::from_millis(200),
        };
        let mut settings = settings(&[]);
        settings.destinations[0].queue_capacity = 1;

        let started = std::time::Instant::now();
        let summary = run_with_io(settings, &scanner, move || Box::new(writer.clone()))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        // writing all 20 lines one after another would take 4 s
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        assert_eq!(summary.events, 20);
        assert!(summary.written >= 1);
        assert!(summary.written <= 5, "wrote {}", summary.written);
        assert_eq!(out.contents().lines().count() as u64, summary.written);
    }

    #[test]
    fn run_propagates_scan_errors() {
        let result = tokio_test::block_on(run_with_io(settings(&[]), &FailingScanner, || {
            Box::new(io::sink())
        }));
        assert!(matches!(result, Err(RunError::Scan(ScanError::Bluetooth(_)))));
    }

    #[tokio::test]
    async fn run_reports_unwritable_file_destination() {
        let mut settings = settings(&[]);
        settings.destinations[0].output =
            OutputTarget::File("/nonexistent/dir/ruuvi.log".into());

        let scanner = FakeScanner::new(Vec::new());
        let result = run_with_io(settings, &scanner, || Box::new(io::sink())).await;
        assert!(matches!(result, Err(RunError::Io(_))));
    }
}
