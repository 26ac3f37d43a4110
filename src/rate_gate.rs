//! Per-device, per-destination publish throttling.
//!
//! Each destination has a minimum interval between two measurements of the
//! same RuuviTag. This is useful for reducing output volume when tags
//! broadcast frequently but data changes slowly, without letting one chatty
//! tag hold back another.

use crate::destination::DestinationId;
use crate::mac_address::MacAddress;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Tracks when each (device, destination) pair last let a measurement through.
///
/// Entries are created on first sight and live as long as the gate. The map is
/// guarded by a single mutex, so the read-then-write of one admission is atomic.
#[derive(Debug, Default)]
pub struct RateGate {
    last_admitted: Mutex<HashMap<(MacAddress, DestinationId), Instant>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a measurement from `mac` may go to `destination` at `now`.
    ///
    /// A zero `interval` always admits without recording anything. Otherwise
    /// the first call for a pair admits, and later calls admit once at least
    /// `interval` has passed since the last admission. Only an admission
    /// moves the stored instant forward.
    pub fn admit(
        &self,
        mac: MacAddress,
        destination: DestinationId,
        interval: Duration,
        now: Instant,
    ) -> bool {
        if interval.is_zero() {
            return true;
        }

        let mut last_admitted = self
            .last_admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match last_admitted.get(&(mac, destination)) {
            Some(last) if now.saturating_duration_since(*last) < interval => false,
            _ => {
                last_admitted.insert((mac, destination), now);
                true
            }
        }
    }

    /// Number of (device, destination) pairs seen so far.
    pub fn len(&self) -> usize {
        self.last_admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
