//! # Total-power aggregation engine
//!
//! Rolls per-device power readings up into one total per rack and per
//! datacenter, and decides when those totals are trustworthy enough to
//! republish.
//!
//! The engine is reactive and single-threaded: the host loop feeds it
//! metric and asset events plus one periodic poll, and the engine tells
//! the loop how long it may sleep (`poll_interval_ms`). Totals are only
//! advertised when every member device has a fresh reading, and at most
//! once per repeat interval; topology reloads are debounced behind asset
//! churn and retried on failure without ever dropping the live snapshot.
//!
//! ## Module organization
//!
//! - `types` - measurements, wire events, topic parsing
//! - `unit` - per-aggregate state machine (coverage + advertise gates)
//! - `topology` - snapshots, provider trait, generation handling
//! - `engine` - orchestrator routing events and driving the cadence
//! - `sink` - outbound metric port

pub mod engine;
pub mod sink;
pub mod topology;
pub mod types;
pub mod unit;

pub use engine::{AggregationEngine, EngineConfig};
pub use sink::{MetricSink, RecordingSink};
pub use topology::{StaticTopologyProvider, TopologyError, TopologyProvider, TopologySnapshot};
pub use types::{AssetEvent, AssetOperation, EngineEvent, Measurement};
pub use unit::AggregateUnit;
