//! Topology snapshots and the provider seam
//!
//! A snapshot is the immutable-per-generation mapping from aggregate name
//! to member devices (plus the reverse device -> owner map), built
//! independently for racks and datacenters. Snapshots are constructed off
//! to the side and swapped in by the engine only once both halves loaded
//! successfully, so a failed reload leaves the previous topology fully
//! intact.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors a topology provider can report
///
/// The engine never lets these escape: any error keeps the old snapshot
/// and schedules a retry.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("topology database error: {0}")]
    Database(String),
    #[error("topology provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of rack and datacenter memberships
///
/// Both loads are independent; a rack result is never reused for DCs.
pub trait TopologyProvider: Send {
    fn load_rack_topology(&self) -> Result<BTreeMap<String, Vec<String>>, TopologyError>;
    fn load_dc_topology(&self) -> Result<BTreeMap<String, Vec<String>>, TopologyError>;
}

/// Forward and reverse maps for one aggregate kind
#[derive(Debug, Clone, Default)]
pub struct TopologyHalf {
    /// aggregate name -> member devices
    pub members: BTreeMap<String, BTreeSet<String>>,
    /// device -> owning aggregate
    pub owners: HashMap<String, String>,
}

impl TopologyHalf {
    /// Build one half from raw provider output
    ///
    /// A device may belong to at most one aggregate of a kind. The first
    /// claim wins; later claims are logged and skipped so the reverse map
    /// never silently flips owners on bad topology data.
    fn build(kind: &str, raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut half = TopologyHalf::default();
        for (aggregate, devices) in raw {
            let member_set = half.members.entry(aggregate.clone()).or_default();
            for device in devices {
                match half.owners.get(&device) {
                    Some(owner) if *owner != aggregate => {
                        log::warn!(
                            "{} '{}' claims device '{}' already owned by '{}', keeping first owner",
                            kind,
                            aggregate,
                            device,
                            owner
                        );
                    }
                    Some(_) => {} // duplicate row for the same owner
                    None => {
                        half.owners.insert(device.clone(), aggregate.clone());
                        member_set.insert(device);
                    }
                }
            }
        }
        half
    }

    pub fn owner_of(&self, device: &str) -> Option<&String> {
        self.owners.get(device)
    }
}

/// One generation of the full topology
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub generation: u64,
    pub racks: TopologyHalf,
    pub dcs: TopologyHalf,
}

impl TopologySnapshot {
    pub fn empty(generation: u64) -> Self {
        Self {
            generation,
            racks: TopologyHalf::default(),
            dcs: TopologyHalf::default(),
        }
    }

    /// Load both halves from the provider and build a fresh snapshot
    ///
    /// Fails without side effects if either load fails.
    pub fn load(
        provider: &dyn TopologyProvider,
        generation: u64,
    ) -> Result<Self, TopologyError> {
        let racks = provider.load_rack_topology()?;
        let dcs = provider.load_dc_topology()?;

        for (rack, devices) in &racks {
            log::info!("rack '{}' powerdevices: {:?}", rack, devices);
        }
        for (dc, devices) in &dcs {
            log::info!("DC '{}' powerdevices: {:?}", dc, devices);
        }

        Ok(Self {
            generation,
            racks: TopologyHalf::build("rack", racks),
            dcs: TopologyHalf::build("DC", dcs),
        })
    }
}

/// Fixed in-memory topology, for tests and bring-up
pub struct StaticTopologyProvider {
    pub racks: BTreeMap<String, Vec<String>>,
    pub dcs: BTreeMap<String, Vec<String>>,
}

impl TopologyProvider for StaticTopologyProvider {
    fn load_rack_topology(&self) -> Result<BTreeMap<String, Vec<String>>, TopologyError> {
        Ok(self.racks.clone())
    }

    fn load_dc_topology(&self) -> Result<BTreeMap<String, Vec<String>>, TopologyError> {
        Ok(self.dcs.clone())
    }
}
