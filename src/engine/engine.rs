//! Aggregation engine - orchestration of units, topology and publishing
//!
//! The engine owns one topology snapshot and one `AggregateUnit` per rack
//! and per datacenter, routes incoming metric events to the units they
//! affect, debounces topology reloads after asset churn, and tells the
//! host loop how long it may sleep before the next `on_poll`.
//!
//! Everything here is single-threaded by construction: one event source,
//! one timer, no locks. The transport and the topology store sit behind
//! the `MetricSink` and `TopologyProvider` seams.

use super::sink::MetricSink;
use super::topology::{TopologyHalf, TopologyProvider, TopologySnapshot};
use super::types::{parse_topic, AssetEvent, AssetOperation, Measurement};
use super::unit::AggregateUnit;
use std::collections::BTreeMap;

/// Engine tuning knobs
///
/// Replaces the original agent's process-wide flags: everything the
/// engine needs is handed over at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum seconds between two advertisements of the same
    /// (aggregate, quantity); also the idle poll ceiling
    pub repeat_interval_secs: i64,
    /// Delay between an asset change (or a failed reload) and the
    /// (re)load attempt, absorbing bursts into one reload
    pub reload_debounce_secs: i64,
    /// Quantities aggregated per rack
    pub rack_quantities: Vec<String>,
    /// Quantities aggregated per datacenter
    pub dc_quantities: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repeat_interval_secs: 300,
            reload_debounce_secs: 60,
            rack_quantities: vec![
                "realpower.default".to_string(),
                "realpower.input.L1".to_string(),
                "realpower.input.L2".to_string(),
                "realpower.input.L3".to_string(),
            ],
            dc_quantities: vec!["realpower.default".to_string()],
        }
    }
}

/// Orchestrator for total-power aggregation
pub struct AggregationEngine {
    config: EngineConfig,
    snapshot: TopologySnapshot,
    racks: BTreeMap<String, AggregateUnit>,
    dcs: BTreeMap<String, AggregateUnit>,
    provider: Box<dyn TopologyProvider>,
    sink: Box<dyn MetricSink>,
    /// Absolute deadline of the pending reload, if one is scheduled
    reload_deadline: Option<i64>,
    /// Timestamp function (for testing with a fixed clock)
    now_fn: Box<dyn Fn() -> i64 + Send>,
}

impl AggregationEngine {
    /// Create an engine with the system clock and an empty topology
    ///
    /// Call `reload()` once before entering the event loop.
    pub fn new(
        config: EngineConfig,
        provider: Box<dyn TopologyProvider>,
        sink: Box<dyn MetricSink>,
    ) -> Self {
        Self::new_with_timestamp_fn(
            config,
            provider,
            sink,
            Box::new(|| chrono::Utc::now().timestamp()),
        )
    }

    /// Create an engine with a custom timestamp function
    pub fn new_with_timestamp_fn(
        config: EngineConfig,
        provider: Box<dyn TopologyProvider>,
        sink: Box<dyn MetricSink>,
        now_fn: Box<dyn Fn() -> i64 + Send>,
    ) -> Self {
        Self {
            config,
            snapshot: TopologySnapshot::empty(0),
            racks: BTreeMap::new(),
            dcs: BTreeMap::new(),
            provider,
            sink,
            reload_deadline: None,
            now_fn,
        }
    }

    /// Load a fresh topology snapshot and swap it in
    ///
    /// On success all units are replaced (measurements accumulated under
    /// the old generation are discarded with it) and any pending reload
    /// is cleared. On failure the current snapshot and units stay
    /// untouched and a retry is scheduled one debounce window out.
    /// Never returns an error to the caller.
    pub fn reload(&mut self) -> bool {
        let now = (self.now_fn)();
        let generation = self.snapshot.generation + 1;
        log::info!("loading power topology (generation {})", generation);

        match TopologySnapshot::load(self.provider.as_ref(), generation) {
            Ok(snapshot) => {
                self.racks = build_units(
                    &snapshot.racks,
                    generation,
                    self.config.repeat_interval_secs,
                );
                self.dcs = build_units(
                    &snapshot.dcs,
                    generation,
                    self.config.repeat_interval_secs,
                );
                self.snapshot = snapshot;
                self.reload_deadline = None;
                log::info!(
                    "topology loaded: {} racks, {} DCs",
                    self.racks.len(),
                    self.dcs.len()
                );
                true
            }
            Err(e) => {
                self.reload_deadline = Some(now + self.config.reload_debounce_secs);
                log::error!(
                    "failed to load topology, keeping previous snapshot, retry in {}s: {}",
                    self.config.reload_debounce_secs,
                    e
                );
                false
            }
        }
    }

    /// Route one metric event to the rack and/or DC unit it affects
    ///
    /// The quantity comes from the topic (part before '@'), the device
    /// from the event's element source. A single reading may feed both a
    /// rack and a DC total. Unknown quantities and devices outside any
    /// tracked aggregate are not errors.
    pub fn process_metric(&mut self, topic: &str, measurement: Measurement) {
        let now = (self.now_fn)();
        let Some((quantity, _)) = parse_topic(topic) else {
            log::debug!("ignoring metric with malformed topic '{}'", topic);
            return;
        };
        let quantity = quantity.to_string();
        let device = measurement.device.clone();

        if self.config.rack_quantities.contains(&quantity) {
            if let Some(rack) = self.snapshot.racks.owner_of(&device).cloned() {
                log::trace!("reading from '{}' affects rack '{}'", device, rack);
                if let Some(unit) = self.racks.get_mut(&rack) {
                    unit.set_measurement(measurement.clone());
                    send_measurement(unit, &quantity, now, self.sink.as_mut());
                }
            }
        }

        if self.config.dc_quantities.contains(&quantity) {
            if let Some(dc) = self.snapshot.dcs.owner_of(&device).cloned() {
                log::trace!("reading from '{}' affects DC '{}'", device, dc);
                if let Some(unit) = self.dcs.get_mut(&dc) {
                    unit.set_measurement(measurement);
                    send_measurement(unit, &quantity, now, self.sink.as_mut());
                }
            }
        }
    }

    /// React to asset churn by scheduling one debounced reload
    ///
    /// Create/update/delete/retire all funnel into the same pending
    /// deadline; while one is pending further events are absorbed.
    pub fn process_asset(&mut self, event: &AssetEvent) {
        match event.operation {
            AssetOperation::Create
            | AssetOperation::Update
            | AssetOperation::Delete
            | AssetOperation::Retire => {}
        }

        if self.reload_deadline.is_none() {
            let deadline = (self.now_fn)() + self.config.reload_debounce_secs;
            self.reload_deadline = Some(deadline);
            log::info!(
                "asset '{}' changed, topology reload scheduled in {}s",
                event.asset_name,
                self.config.reload_debounce_secs
            );
        }
    }

    /// Periodic maintenance, fired when the host loop's timeout expires
    ///
    /// Purges expired readings, re-announces still-valid totals on their
    /// cadence, and performs a due topology reload.
    pub fn on_poll(&mut self) {
        let now = (self.now_fn)();

        for unit in self.racks.values_mut() {
            unit.drop_old_metric_infos(now);
            for quantity in &self.config.rack_quantities {
                send_measurement(unit, quantity, now, self.sink.as_mut());
            }
        }
        for unit in self.dcs.values_mut() {
            unit.drop_old_metric_infos(now);
            for quantity in &self.config.dc_quantities {
                send_measurement(unit, quantity, now, self.sink.as_mut());
            }
        }

        if matches!(self.reload_deadline, Some(deadline) if deadline <= now) {
            self.reload();
        }
    }

    /// Milliseconds the host loop may wait before the next `on_poll`
    ///
    /// Minimum over every pending per-quantity advertisement deadline and
    /// the pending reload deadline, with the repeat interval as the idle
    /// ceiling. Must be re-read after every processed event.
    pub fn poll_interval_ms(&self) -> u64 {
        let now = (self.now_fn)();
        let mut wait = self.config.repeat_interval_secs;

        for unit in self.racks.values() {
            for quantity in &self.config.rack_quantities {
                let t = unit.time_to_advertisement(quantity, now);
                if t > 0 && t < wait {
                    wait = t;
                }
            }
        }
        for unit in self.dcs.values() {
            for quantity in &self.config.dc_quantities {
                let t = unit.time_to_advertisement(quantity, now);
                if t > 0 && t < wait {
                    wait = t;
                }
            }
        }

        if let Some(deadline) = self.reload_deadline {
            let t = (deadline - now + 1).max(1);
            if t < wait {
                wait = t;
            }
        }

        (wait.max(1) as u64) * 1000
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    pub fn reload_pending(&self) -> bool {
        self.reload_deadline.is_some()
    }

    pub fn rack_unit(&self, name: &str) -> Option<&AggregateUnit> {
        self.racks.get(name)
    }

    pub fn dc_unit(&self, name: &str) -> Option<&AggregateUnit> {
        self.dcs.get(name)
    }
}

/// Create fresh units for one topology half
fn build_units(
    half: &TopologyHalf,
    generation: u64,
    repeat_interval: i64,
) -> BTreeMap<String, AggregateUnit> {
    half.members
        .iter()
        .map(|(name, members)| {
            (
                name.clone(),
                AggregateUnit::new(name.clone(), generation, members.clone(), repeat_interval),
            )
        })
        .collect()
}

/// Compute and, if the gates allow, publish one aggregate total
///
/// Publish success advances the advertisement clock; a refused publish
/// leaves it alone so the next due cycle retries. Incomplete coverage is
/// logged with the devices holding the total back.
fn send_measurement(
    unit: &mut AggregateUnit,
    quantity: &str,
    now: i64,
    sink: &mut dyn MetricSink,
) {
    unit.calculate(quantity, now);
    if unit.advertise(quantity, now) {
        match unit.metric(quantity, now) {
            Some(metric) => {
                if sink.send(&metric) {
                    unit.advertised(quantity, now);
                } else {
                    log::warn!(
                        "publish of {} refused by sink, will retry next cycle",
                        metric.topic()
                    );
                }
            }
            None => {
                // covered but no readings stored yet for this quantity
            }
        }
    } else {
        let unknown = unit.devices_in_unknown_state(quantity, now);
        if !unknown.is_empty() {
            log::info!(
                "{} devices preventing total {} calculation for {}: {}",
                unknown.len(),
                quantity,
                unit.name(),
                unknown.iter().cloned().collect::<Vec<_>>().join(" ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sink::RecordingSink;
    use crate::engine::topology::StaticTopologyProvider;
    use std::collections::BTreeMap as Map;
    use std::sync::{Arc, Mutex};

    const REPEAT: i64 = 300;
    const DEBOUNCE: i64 = 60;

    fn test_config() -> EngineConfig {
        EngineConfig {
            repeat_interval_secs: REPEAT,
            reload_debounce_secs: DEBOUNCE,
            rack_quantities: vec!["realpower.default".to_string()],
            dc_quantities: vec!["realpower.default".to_string()],
        }
    }

    fn raw(entries: &[(&str, &[&str])]) -> Map<String, Vec<String>> {
        entries
            .iter()
            .map(|(name, devices)| {
                (
                    name.to_string(),
                    devices.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    /// Engine over a one-rack topology with a shared, settable clock
    fn make_engine(
        racks: Map<String, Vec<String>>,
        dcs: Map<String, Vec<String>>,
        clock: Arc<Mutex<i64>>,
    ) -> (AggregationEngine, Arc<Mutex<Vec<Measurement>>>, Arc<Mutex<bool>>) {
        let sink = RecordingSink::new();
        let (sent, accept) = sink.handles();
        let clock_fn = Arc::clone(&clock);
        let mut engine = AggregationEngine::new_with_timestamp_fn(
            test_config(),
            Box::new(StaticTopologyProvider { racks, dcs }),
            Box::new(sink),
            Box::new(move || *clock_fn.lock().unwrap()),
        );
        assert!(engine.reload());
        (engine, sent, accept)
    }

    fn make_reading(device: &str, value: f64, timestamp: i64) -> Measurement {
        Measurement {
            quantity: "realpower.default".to_string(),
            device: device.to_string(),
            value,
            unit: "W".to_string(),
            ttl: 600,
            timestamp,
        }
    }

    #[test]
    fn test_publishes_once_when_coverage_completes() {
        // Rack1 = {epdu-1, epdu-2}; second reading completes coverage
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1", "epdu-2"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        assert!(sent.lock().unwrap().is_empty());

        engine.process_metric("realpower.default@epdu-2", make_reading("epdu-2", 150.0, 1000));

        let published = sent.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic(), "realpower.default@Rack1");
        assert_eq!(published[0].value, 250.0);
    }

    #[test]
    fn test_suppressed_within_repeat_interval() {
        // Continuous fresh input must not re-publish inside the interval
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        for i in 1..10 {
            *clock.lock().unwrap() = 1000 + i * 10;
            engine.process_metric(
                "realpower.default@epdu-1",
                make_reading("epdu-1", 100.0 + i as f64, 1000 + i * 10),
            );
        }
        assert_eq!(sent.lock().unwrap().len(), 1);

        // after the interval the latest total goes out
        *clock.lock().unwrap() = 1000 + REPEAT;
        engine.process_metric(
            "realpower.default@epdu-1",
            make_reading("epdu-1", 500.0, 1000 + REPEAT),
        );
        let published = sent.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].value, 500.0);
    }

    #[test]
    fn test_one_metric_feeds_rack_and_dc() {
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[("DC1", &["epdu-1"])]),
            Arc::clone(&clock),
        );

        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));

        let published = sent.lock().unwrap();
        let topics: Vec<String> = published.iter().map(|m| m.topic()).collect();
        assert_eq!(topics.len(), 2);
        assert!(topics.contains(&"realpower.default@Rack1".to_string()));
        assert!(topics.contains(&"realpower.default@DC1".to_string()));
    }

    #[test]
    fn test_unknown_device_and_quantity_ignored() {
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        // device not in any aggregate
        engine.process_metric("realpower.default@epdu-9", make_reading("epdu-9", 42.0, 1000));
        // quantity not in any relevance list
        let mut temp = make_reading("epdu-1", 21.0, 1000);
        temp.quantity = "temperature.default".to_string();
        engine.process_metric("temperature.default@epdu-1", temp);
        // malformed topic
        engine.process_metric("garbage-topic", make_reading("epdu-1", 1.0, 1000));

        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_publish_failure_retries_with_latest_total() {
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, accept) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        // sink refuses: no publish recorded, clock not advanced
        *accept.lock().unwrap() = false;
        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        assert!(sent.lock().unwrap().is_empty());

        // next event retries immediately (still due) with the newer total
        *accept.lock().unwrap() = true;
        *clock.lock().unwrap() = 1010;
        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 120.0, 1010));
        let published = sent.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].value, 120.0);
    }

    #[test]
    fn test_on_poll_reannounces_on_cadence() {
        // No fresh input after the first publish; poll re-announces the
        // still-valid total once the interval elapses.
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        assert_eq!(sent.lock().unwrap().len(), 1);

        *clock.lock().unwrap() = 1000 + REPEAT;
        engine.on_poll();
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_on_poll_expires_readings_instead_of_reannouncing() {
        // Reading ttl runs out before the next cadence: no re-publish
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        let mut reading = make_reading("epdu-1", 100.0, 1000);
        reading.ttl = 120; // shorter than the repeat interval
        engine.process_metric("realpower.default@epdu-1", reading);
        assert_eq!(sent.lock().unwrap().len(), 1);

        *clock.lock().unwrap() = 1000 + REPEAT;
        engine.on_poll();
        assert_eq!(sent.lock().unwrap().len(), 1);
        assert!(engine
            .rack_unit("Rack1")
            .unwrap()
            .devices_in_unknown_state("realpower.default", 1000 + REPEAT)
            .contains("epdu-1"));
    }

    #[test]
    fn test_asset_event_schedules_single_debounced_reload() {
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, _, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );
        assert!(!engine.reload_pending());

        engine.process_asset(&AssetEvent {
            operation: AssetOperation::Create,
            asset_name: "epdu-7".to_string(),
        });
        assert!(engine.reload_pending());
        let wait_after_first = engine.poll_interval_ms();

        // a burst of further churn is absorbed by the pending deadline
        *clock.lock().unwrap() = 1030;
        engine.process_asset(&AssetEvent {
            operation: AssetOperation::Delete,
            asset_name: "epdu-8".to_string(),
        });
        assert!(engine.poll_interval_ms() < wait_after_first);

        // reload fires on poll once the deadline passes and bumps the
        // generation
        *clock.lock().unwrap() = 1000 + DEBOUNCE;
        assert_eq!(engine.generation(), 1);
        engine.on_poll();
        assert_eq!(engine.generation(), 2);
        assert!(!engine.reload_pending());
    }

    #[test]
    fn test_reload_replaces_units_and_drops_measurements() {
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, sent, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        assert_eq!(sent.lock().unwrap().len(), 1);

        assert!(engine.reload());

        // fresh generation: measurements and advertise clocks are gone,
        // so completing coverage publishes again immediately
        *clock.lock().unwrap() = 1010;
        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 130.0, 1010));
        let published = sent.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].value, 130.0);
    }

    struct FlakyProvider {
        fail: Arc<Mutex<bool>>,
        racks: Map<String, Vec<String>>,
    }

    impl crate::engine::topology::TopologyProvider for FlakyProvider {
        fn load_rack_topology(
            &self,
        ) -> Result<Map<String, Vec<String>>, crate::engine::topology::TopologyError> {
            if *self.fail.lock().unwrap() {
                Err(crate::engine::topology::TopologyError::Database(
                    "table locked".to_string(),
                ))
            } else {
                Ok(self.racks.clone())
            }
        }

        fn load_dc_topology(
            &self,
        ) -> Result<Map<String, Vec<String>>, crate::engine::topology::TopologyError> {
            Ok(Map::new())
        }
    }

    #[test]
    fn test_failed_reload_keeps_previous_snapshot_and_retries() {
        let clock = Arc::new(Mutex::new(1000));
        let fail = Arc::new(Mutex::new(false));
        let sink = RecordingSink::new();
        let (sent, _) = sink.handles();
        let clock_fn = Arc::clone(&clock);
        let mut engine = AggregationEngine::new_with_timestamp_fn(
            test_config(),
            Box::new(FlakyProvider {
                fail: Arc::clone(&fail),
                racks: raw(&[("Rack1", &["epdu-1"])]),
            }),
            Box::new(sink),
            Box::new(move || *clock_fn.lock().unwrap()),
        );
        assert!(engine.reload());
        assert_eq!(engine.generation(), 1);

        // reload fails: old snapshot stays live, retry scheduled
        *fail.lock().unwrap() = true;
        assert!(!engine.reload());
        assert_eq!(engine.generation(), 1);
        assert!(engine.reload_pending());

        // engine still routes metrics against the retained topology
        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 90.0, 1000));
        assert_eq!(sent.lock().unwrap().len(), 1);

        // retry succeeds on poll after the backoff
        *fail.lock().unwrap() = false;
        *clock.lock().unwrap() = 1000 + DEBOUNCE;
        engine.on_poll();
        assert_eq!(engine.generation(), 2);
        assert!(!engine.reload_pending());
    }

    #[test]
    fn test_removed_aggregate_receives_no_updates() {
        let clock = Arc::new(Mutex::new(1000));
        let racks = Arc::new(Mutex::new(raw(&[("Rack1", &["epdu-1"])])));

        struct SwitchableProvider {
            racks: Arc<Mutex<Map<String, Vec<String>>>>,
        }
        impl crate::engine::topology::TopologyProvider for SwitchableProvider {
            fn load_rack_topology(
                &self,
            ) -> Result<Map<String, Vec<String>>, crate::engine::topology::TopologyError>
            {
                Ok(self.racks.lock().unwrap().clone())
            }
            fn load_dc_topology(
                &self,
            ) -> Result<Map<String, Vec<String>>, crate::engine::topology::TopologyError>
            {
                Ok(Map::new())
            }
        }

        let sink = RecordingSink::new();
        let (sent, _) = sink.handles();
        let clock_fn = Arc::clone(&clock);
        let mut engine = AggregationEngine::new_with_timestamp_fn(
            test_config(),
            Box::new(SwitchableProvider {
                racks: Arc::clone(&racks),
            }),
            Box::new(sink),
            Box::new(move || *clock_fn.lock().unwrap()),
        );
        assert!(engine.reload());

        // Rack1 disappears in the next generation
        *racks.lock().unwrap() = raw(&[("Rack2", &["epdu-2"])]);
        assert!(engine.reload());
        assert!(engine.rack_unit("Rack1").is_none());

        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_poll_interval_tracks_nearest_deadline() {
        let clock = Arc::new(Mutex::new(1000));
        let (mut engine, _, _) = make_engine(
            raw(&[("Rack1", &["epdu-1"])]),
            raw(&[]),
            Arc::clone(&clock),
        );

        // nothing pending: ceiling
        assert_eq!(engine.poll_interval_ms(), (REPEAT as u64) * 1000);

        // one advertisement done: next wake is its repeat deadline
        engine.process_metric("realpower.default@epdu-1", make_reading("epdu-1", 100.0, 1000));
        *clock.lock().unwrap() = 1050;
        assert_eq!(engine.poll_interval_ms(), ((REPEAT - 50) as u64) * 1000);

        // pending reload sooner than the advertisement deadline wins
        engine.process_asset(&AssetEvent {
            operation: AssetOperation::Update,
            asset_name: "epdu-1".to_string(),
        });
        assert_eq!(engine.poll_interval_ms(), ((DEBOUNCE + 1) as u64) * 1000);

        // overdue reload clamps to the 1s floor
        *clock.lock().unwrap() = 1050 + DEBOUNCE + 30;
        assert_eq!(engine.poll_interval_ms(), 1000);
    }
}
