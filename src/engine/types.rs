//! Core data structures for the aggregation engine
//!
//! A `Measurement` is one reading of one quantity on one device. The same
//! struct is reused for outbound aggregate metrics, where the "device" is
//! the rack or datacenter name.

use serde::{Deserialize, Serialize};

/// One power reading for a (quantity, device) pair
///
/// Freshness is declared by the producer: a measurement is usable at time
/// `now` iff `now - timestamp <= ttl`.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Measured quantity, e.g. "realpower.default" or "realpower.input.L2"
    pub quantity: String,
    /// Device (or aggregate, for outbound metrics) this reading belongs to
    pub device: String,
    pub value: f64,
    /// Unit string as reported by the device, e.g. "W"
    pub unit: String,
    /// Validity window in seconds, declared by the producer
    pub ttl: u32,
    /// Unix timestamp declared by the producer (not arrival time)
    pub timestamp: i64,
}

impl Measurement {
    /// Whether this reading is still usable at `now`
    pub fn is_fresh(&self, now: i64) -> bool {
        now - self.timestamp <= self.ttl as i64
    }

    /// Wire topic for this measurement: `<quantity>@<device>`
    pub fn topic(&self) -> String {
        format!("{}@{}", self.quantity, self.device)
    }
}

/// Split a metric topic `<quantity>@<device>` into its two parts
///
/// The quantity itself may contain dots ("realpower.input.L3") but never
/// an `@`; everything after the first `@` names the originating device.
pub fn parse_topic(topic: &str) -> Option<(&str, &str)> {
    let (quantity, device) = topic.split_once('@')?;
    if quantity.is_empty() || device.is_empty() {
        return None;
    }
    Some((quantity, device))
}

/// Parse a wire metric value into an f64
///
/// Values travel as strings on the wire. The whole string must parse and
/// the result must be a finite number; anything else is rejected so a
/// malformed reading never poisons a total.
pub fn parse_metric_value(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value)
}

/// Asset lifecycle operation carried by an asset event
///
/// Only these four trigger a topology reload; any other operation string
/// on the wire is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOperation {
    Create,
    Update,
    Delete,
    Retire,
}

/// Asset change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEvent {
    pub operation: AssetOperation,
    pub asset_name: String,
}

/// Event delivered to the engine loop by the transport
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Metric {
        /// Full metric topic, `<quantity>@<device>`
        topic: String,
        measurement: Measurement,
    },
    Asset(AssetEvent),
}
