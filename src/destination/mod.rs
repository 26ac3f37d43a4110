//! Measurement destinations.
//!
//! A destination is a bounded, best-effort queue in front of a sink. The
//! dispatcher offers each measurement without waiting; a full or closed queue
//! drops the measurement for that destination only. A consumer task per
//! destination drains the queue and does the I/O (see [`sink`]).

pub mod sink;

use crate::measurement::Measurement;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// Capacity of a destination queue unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Position of a destination in the dispatcher's list; keys rate-gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestinationId(pub usize);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something the dispatcher can hand measurements to.
pub trait Destination: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Minimum time between two measurements of the same tag. Zero disables limiting.
    fn minimum_interval(&self) -> Duration;

    /// Enqueue without blocking. Returns `false` when the measurement was dropped.
    fn offer(&self, measurement: Measurement) -> bool;
}

/// A [`Destination`] backed by a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct QueueDestination {
    name: String,
    minimum_interval: Duration,
    sender: mpsc::Sender<Measurement>,
}

/// Create a destination and the receiving end its consumer drains.
///
/// A `capacity` of zero is raised to one.
pub fn channel(
    name: impl Into<String>,
    minimum_interval: Duration,
    capacity: usize,
) -> (QueueDestination, mpsc::Receiver<Measurement>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let destination = QueueDestination {
        name: name.into(),
        minimum_interval,
        sender,
    };
    (destination, receiver)
}

impl Destination for QueueDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn minimum_interval(&self) -> Duration {
        self.minimum_interval
    }

    fn offer(&self, measurement: Measurement) -> bool {
        match self.sender.try_send(measurement) {
            Ok(()) => true,
            Err(TrySendError::Full(m)) => {
                trace!(destination = %self.name, mac = %m.mac, "queue full, dropping measurement");
                false
            }
            Err(TrySendError::Closed(m)) => {
                trace!(destination = %self.name, mac = %m.mac, "queue closed, dropping measurement");
                false
            }
        }
    }
}
