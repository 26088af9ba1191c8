//! SQLite-backed topology provider
//!
//! The asset database carries one row per (aggregate, device) membership
//! in the `power_topology` table; rack and datacenter memberships are
//! kept apart by the `aggregate_kind` column and loaded independently.

use crate::engine::{TopologyError, TopologyProvider};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS power_topology (
        aggregate_name TEXT NOT NULL,
        aggregate_kind TEXT NOT NULL CHECK (aggregate_kind IN ('rack', 'datacenter')),
        device_name    TEXT NOT NULL,
        PRIMARY KEY (aggregate_kind, aggregate_name, device_name)
    )
";

/// Topology provider reading memberships from a SQLite asset database
///
/// A connection is opened per load: reloads are rare (debounced to once
/// per minute at most) and a persistent handle would only hold locks
/// against the asset management process writing the table.
pub struct SqliteTopologyProvider {
    db_path: PathBuf,
}

impl SqliteTopologyProvider {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Create the topology table if missing (idempotent)
    pub fn ensure_schema(&self) -> Result<(), TopologyError> {
        let conn = self.open()?;
        conn.execute(SCHEMA, []).map_err(db_err)?;
        Ok(())
    }

    fn open(&self) -> Result<Connection, TopologyError> {
        let conn = Connection::open(&self.db_path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(db_err)?;
        conn.pragma_update(None, "busy_timeout", 5_000).map_err(db_err)?;
        Ok(conn)
    }

    fn load_kind(&self, kind: &str) -> Result<BTreeMap<String, Vec<String>>, TopologyError> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT aggregate_name, device_name FROM power_topology
                 WHERE aggregate_kind = ?1
                 ORDER BY aggregate_name, device_name",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([kind], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err)?;

        let mut topology: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (aggregate, device) = row.map_err(db_err)?;
            topology.entry(aggregate).or_default().push(device);
        }
        Ok(topology)
    }
}

impl TopologyProvider for SqliteTopologyProvider {
    fn load_rack_topology(&self) -> Result<BTreeMap<String, Vec<String>>, TopologyError> {
        self.load_kind("rack")
    }

    fn load_dc_topology(&self) -> Result<BTreeMap<String, Vec<String>>, TopologyError> {
        self.load_kind("datacenter")
    }
}

fn db_err(e: rusqlite::Error) -> TopologyError {
    TopologyError::Database(e.to_string())
}
