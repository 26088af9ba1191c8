//! Per-aggregate state machine
//!
//! An `AggregateUnit` tracks the latest reading per (member device,
//! quantity), computes the aggregate total for a quantity, and owns the
//! advertise/suppress decision: a total is only published when every
//! member has a fresh reading AND the repeat interval has elapsed since
//! the last successful publish.
//!
//! Units are created fresh on every topology reload and keep no state
//! across generations.

use super::types::Measurement;
use std::collections::{BTreeMap, BTreeSet};

/// State machine for one rack or datacenter
#[derive(Debug, Clone)]
pub struct AggregateUnit {
    /// Aggregate name, e.g. "Rack1" or "DC-main"
    name: String,
    /// Topology generation this unit belongs to
    generation: u64,
    /// Member devices feeding this aggregate
    members: BTreeSet<String>,
    /// Latest reading per quantity, per member device
    measurements: BTreeMap<String, BTreeMap<String, Measurement>>,
    /// Last computed total per quantity (cached by `calculate`)
    totals: BTreeMap<String, f64>,
    /// Last successful advertisement time per quantity
    advertised_at: BTreeMap<String, i64>,
    /// Minimum seconds between successful advertisements of one quantity
    repeat_interval: i64,
}

impl AggregateUnit {
    pub fn new(
        name: String,
        generation: u64,
        members: BTreeSet<String>,
        repeat_interval: i64,
    ) -> Self {
        Self {
            name,
            generation,
            members,
            measurements: BTreeMap::new(),
            totals: BTreeMap::new(),
            advertised_at: BTreeMap::new(),
            repeat_interval,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    /// Store a reading, last-write-wins by declared timestamp
    ///
    /// A reading older than the stored one is dropped: delivery order on
    /// the bus is not guaranteed and must not roll a device backwards. An
    /// equal timestamp refreshes the stored value but, like any other
    /// store, never touches the advertise clock.
    pub fn set_measurement(&mut self, m: Measurement) {
        if !self.members.contains(&m.device) {
            return;
        }
        let per_device = self.measurements.entry(m.quantity.clone()).or_default();
        match per_device.get(&m.device) {
            Some(stored) if stored.timestamp > m.timestamp => {
                log::debug!(
                    "{}: stale reading for {}@{} ({} < {}), keeping stored",
                    self.name,
                    m.quantity,
                    m.device,
                    m.timestamp,
                    stored.timestamp
                );
            }
            _ => {
                per_device.insert(m.device.clone(), m);
            }
        }
    }

    /// Sum fresh readings for `quantity` across all members
    ///
    /// Returns the total and the set of members without a fresh reading.
    /// The total is also cached for `metric()`.
    pub fn calculate(&mut self, quantity: &str, now: i64) -> (f64, BTreeSet<String>) {
        let mut total = 0.0;
        let mut unknown = BTreeSet::new();
        let per_device = self.measurements.get(quantity);

        for member in &self.members {
            match per_device.and_then(|m| m.get(member)) {
                Some(m) if m.is_fresh(now) => total += m.value,
                _ => {
                    unknown.insert(member.clone());
                }
            }
        }

        self.totals.insert(quantity.to_string(), total);
        (total, unknown)
    }

    /// Hard gate before publishing: full coverage AND repeat interval elapsed
    ///
    /// Partial totals are never published, regardless of timing.
    pub fn advertise(&self, quantity: &str, now: i64) -> bool {
        if !self.devices_in_unknown_state(quantity, now).is_empty() {
            return false;
        }
        self.time_to_advertisement(quantity, now) <= 0
    }

    /// Record a successful publish; resets the timing gate
    pub fn advertised(&mut self, quantity: &str, now: i64) {
        self.advertised_at.insert(quantity.to_string(), now);
    }

    /// Seconds until the timing gate next opens for `quantity`
    ///
    /// Ignores coverage; <= 0 means due now. A quantity that has never
    /// been advertised is always due.
    pub fn time_to_advertisement(&self, quantity: &str, now: i64) -> i64 {
        match self.advertised_at.get(quantity) {
            Some(last) => last + self.repeat_interval - now,
            None => 0,
        }
    }

    /// Purge readings whose age exceeds their ttl
    ///
    /// Called from the periodic poll path only; per-arrival purging would
    /// cost a full scan on every metric.
    pub fn drop_old_metric_infos(&mut self, now: i64) {
        for per_device in self.measurements.values_mut() {
            per_device.retain(|_, m| m.is_fresh(now));
        }
    }

    /// Members lacking a fresh reading for `quantity`, for diagnostics
    pub fn devices_in_unknown_state(&self, quantity: &str, now: i64) -> BTreeSet<String> {
        let per_device = self.measurements.get(quantity);
        self.members
            .iter()
            .filter(|member| {
                !matches!(
                    per_device.and_then(|m| m.get(*member)),
                    Some(m) if m.is_fresh(now)
                )
            })
            .cloned()
            .collect()
    }

    /// Build the outbound aggregate metric for `quantity`
    ///
    /// Value is the total cached by the last `calculate`; the unit string
    /// is borrowed from a member reading. Outbound ttl is twice the
    /// repeat interval so a consumer survives one missed cycle.
    pub fn metric(&self, quantity: &str, now: i64) -> Option<Measurement> {
        let total = *self.totals.get(quantity)?;
        let unit = self
            .measurements
            .get(quantity)
            .and_then(|per_device| per_device.values().next())
            .map(|m| m.unit.clone())?;

        Some(Measurement {
            quantity: quantity.to_string(),
            device: self.name.clone(),
            value: total,
            unit,
            ttl: (self.repeat_interval * 2) as u32,
            timestamp: now,
        })
    }
}
