//! powerflow - total input power aggregation agent
//!
//! Listens to per-device power readings on the message bus, rolls them
//! up into per-rack and per-datacenter totals, and republishes those
//! totals as new metrics at a throttled cadence. Topology comes from the
//! asset database and is reloaded (debounced) when assets change.

pub mod config;
pub mod engine;
pub mod runtime;
pub mod topology_db;
pub mod transport;
