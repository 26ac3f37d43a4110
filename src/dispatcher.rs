//! One radio event in, zero or more queued measurements out.

use crate::advertisement::RawAdvertisement;
use crate::alias::{self, AliasMap};
use crate::cache::TagCache;
use crate::calculator;
use crate::decoder::{self, DecodeError, RUUVI_MANUFACTURER_ID};
use crate::destination::{Destination, DestinationId};
use crate::mac_address::MacAddress;
use crate::measurement::Measurement;
use crate::rate_gate::RateGate;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, trace};

/// Shortest manufacturer data worth decoding: company ID plus at least one byte
/// past the format tag.
const MIN_MANUFACTURER_DATA_LEN: usize = 3;

/// Operator rules applied to every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchRules {
    /// Decode advertisements from any vendor, not just Ruuvi
    pub all_advertisements: bool,
    pub aliases: AliasMap,
    /// Tags eligible for forwarding; empty allows all
    pub enabled_tags: BTreeSet<MacAddress>,
}

impl DispatchRules {
    fn allows(&self, mac: &MacAddress) -> bool {
        self.enabled_tags.is_empty() || self.enabled_tags.contains(mac)
    }
}

/// Per-destination tally for one forwarded measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub accepted: usize,
    pub rate_limited: usize,
    pub dropped: usize,
}

/// What [`Dispatcher::dispatch`] did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Too short, or not Ruuvi manufacturer data
    Ignored,
    DecodeFailed(DecodeError),
    /// Cached, but the tag is not on the allow-list
    NotAllowed,
    Forwarded(Delivery),
}

pub struct Dispatcher {
    rules: DispatchRules,
    cache: Arc<TagCache>,
    rate_gate: Arc<RateGate>,
    destinations: Vec<Box<dyn Destination>>,
}

impl Dispatcher {
    pub fn new(
        rules: DispatchRules,
        cache: Arc<TagCache>,
        rate_gate: Arc<RateGate>,
        destinations: Vec<Box<dyn Destination>>,
    ) -> Self {
        Self {
            rules,
            cache,
            rate_gate,
            destinations,
        }
    }

    pub fn destinations(&self) -> &[Box<dyn Destination>] {
        &self.destinations
    }

    /// Dispatch with the current clocks.
    pub fn dispatch(&self, advertisement: &RawAdvertisement) -> DispatchOutcome {
        self.dispatch_at(advertisement, Instant::now(), SystemTime::now())
    }

    /// Dispatch `advertisement` as if received at `now`.
    ///
    /// `now` drives rate limiting, `timestamp` becomes the measurement's
    /// wall-clock time. Never blocks: destinations are offered the measurement
    /// without waiting for queue space.
    pub fn dispatch_at(
        &self,
        advertisement: &RawAdvertisement,
        now: Instant,
        timestamp: SystemTime,
    ) -> DispatchOutcome {
        let mac = advertisement.address;
        if advertisement.manufacturer_data.len() < MIN_MANUFACTURER_DATA_LEN {
            trace!(%mac, "manufacturer data too short");
            return DispatchOutcome::Ignored;
        }
        if !self.rules.all_advertisements
            && advertisement.vendor_id() != Some(RUUVI_MANUFACTURER_ID)
        {
            trace!(%mac, vendor = ?advertisement.vendor_id(), "not a Ruuvi advertisement");
            return DispatchOutcome::Ignored;
        }

        let values = match decoder::decode(advertisement.payload()) {
            Ok(values) => values,
            Err(error) => {
                debug!(%mac, rssi = ?advertisement.rssi, %error, "failed to decode advertisement");
                return DispatchOutcome::DecodeFailed(error);
            }
        };

        let mut measurement = Measurement::new(mac, timestamp, values);
        measurement.rssi = advertisement.rssi;
        measurement.name = alias::resolve_name(
            &mac,
            &self.rules.aliases,
            advertisement.local_name.as_deref(),
        );
        let measurement = calculator::augment(measurement);
        trace!(%mac, format = %measurement.values.data_format, "decoded measurement");

        self.cache.update(&measurement);

        if !self.rules.allows(&mac) {
            trace!(%mac, "tag not enabled, not forwarding");
            return DispatchOutcome::NotAllowed;
        }

        let mut delivery = Delivery::default();
        for (index, destination) in self.destinations.iter().enumerate() {
            let id = DestinationId(index);
            if !self
                .rate_gate
                .admit(mac, id, destination.minimum_interval(), now)
            {
                trace!(%mac, destination = destination.name(), "rate limited");
                delivery.rate_limited += 1;
                continue;
            }
            if destination.offer(measurement.clone()) {
                delivery.accepted += 1;
            } else {
                delivery.dropped += 1;
            }
        }
        DispatchOutcome::Forwarded(delivery)
    }
}
