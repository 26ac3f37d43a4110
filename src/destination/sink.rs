//! Line-oriented sinks and the consumer task that feeds them.
//!
//! Writes go through `std::io` and may block for as long as the reader on the
//! other side is stalled, so each consumer runs on tokio's blocking pool rather
//! than on the executor that drives scanning and dispatch.

use crate::measurement::Measurement;
use crate::output::{FormatError, OutputFormatter};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::{self, LineWriter, Write};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, warn};

/// Why one measurement did not reach its sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Where a sink writes its lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum OutputTarget {
    #[default]
    Stdout,
    /// Appended to, created if missing
    File(PathBuf),
}

impl From<String> for OutputTarget {
    fn from(value: String) -> Self {
        match value.as_str() {
            "stdout" | "-" => OutputTarget::Stdout,
            _ => OutputTarget::File(PathBuf::from(value)),
        }
    }
}

impl OutputTarget {
    pub fn open(&self) -> io::Result<Box<dyn Write + Send>> {
        match self {
            OutputTarget::Stdout => Ok(Box::new(io::stdout())),
            OutputTarget::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Box::new(LineWriter::new(file)))
            }
        }
    }
}

/// A formatter paired with the writer its lines go to.
pub struct OutputSink {
    formatter: Box<dyn OutputFormatter>,
    writer: Box<dyn Write + Send>,
}

impl OutputSink {
    pub fn new(formatter: Box<dyn OutputFormatter>, writer: Box<dyn Write + Send>) -> Self {
        Self { formatter, writer }
    }

    /// Format `measurement` and write it as one line.
    ///
    /// Nothing is written when formatting fails.
    pub fn write(&mut self, measurement: &Measurement) -> Result<(), SinkError> {
        let line = self.formatter.format(measurement)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Drain `receiver` into `sink` until every sender is gone.
///
/// Blocks the calling thread; must not run on an async executor. Write errors
/// are logged and the measurement skipped; the loop keeps going. Returns the
/// number of lines written.
pub fn drain(name: String, mut receiver: mpsc::Receiver<Measurement>, mut sink: OutputSink) -> u64 {
    let mut written = 0;
    while let Some(measurement) = receiver.blocking_recv() {
        match sink.write(&measurement) {
            Ok(()) => written += 1,
            Err(error) => {
                warn!(destination = %name, mac = %measurement.mac, %error, "failed to write measurement");
            }
        }
    }
    debug!(destination = %name, written, "destination queue closed");
    written
}

/// Run [`drain`] on the blocking pool.
pub fn spawn_consumer(
    name: String,
    receiver: mpsc::Receiver<Measurement>,
    sink: OutputSink,
) -> JoinHandle<u64> {
    task::spawn_blocking(move || drain(name, receiver, sink))
}
