//! Runtime configuration from environment variables

use crate::engine::EngineConfig;
use std::env;

/// Configuration for the powerflow agent
///
/// Loaded from environment variables with sensible defaults; `.env`
/// files are honored via dotenv in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    /// MQTT broker host
    pub mqtt_host: String,
    /// MQTT broker port
    pub mqtt_port: u16,
    /// Topic prefix; metrics travel under `<prefix>/metrics/`,
    /// asset events under `<prefix>/assets/`
    pub topic_prefix: String,
    /// Path to the SQLite asset database holding the power topology
    pub db_path: String,
    /// Buffer size of the transport -> engine event channel
    pub channel_buffer: usize,
    /// Seconds between advertisements of one (aggregate, quantity)
    pub repeat_interval_secs: i64,
    /// Debounce/retry window for topology reloads, seconds
    pub reload_debounce_secs: i64,
    /// Quantities rolled up per rack (comma-separated in env)
    pub rack_quantities: Vec<String>,
    /// Quantities rolled up per datacenter
    pub dc_quantities: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `POWERFLOW_MQTT_HOST` (default: localhost)
    /// - `POWERFLOW_MQTT_PORT` (default: 1883)
    /// - `POWERFLOW_TOPIC_PREFIX` (default: powerflow)
    /// - `POWERFLOW_DB_PATH` (default: /var/lib/powerflow/assets.db)
    /// - `POWERFLOW_CHANNEL_BUFFER` (default: 1000)
    /// - `POWERFLOW_REPEAT_INTERVAL_SECS` (default: 300)
    /// - `POWERFLOW_RELOAD_DEBOUNCE_SECS` (default: 60)
    /// - `POWERFLOW_RACK_QUANTITIES` (comma-separated)
    /// - `POWERFLOW_DC_QUANTITIES` (comma-separated)
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        Self {
            mqtt_host: env::var("POWERFLOW_MQTT_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),

            mqtt_port: env::var("POWERFLOW_MQTT_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1883),

            topic_prefix: env::var("POWERFLOW_TOPIC_PREFIX")
                .unwrap_or_else(|_| "powerflow".to_string()),

            db_path: env::var("POWERFLOW_DB_PATH")
                .unwrap_or_else(|_| "/var/lib/powerflow/assets.db".to_string()),

            channel_buffer: env::var("POWERFLOW_CHANNEL_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            repeat_interval_secs: env::var("POWERFLOW_REPEAT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.repeat_interval_secs),

            reload_debounce_secs: env::var("POWERFLOW_RELOAD_DEBOUNCE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.reload_debounce_secs),

            rack_quantities: env::var("POWERFLOW_RACK_QUANTITIES")
                .map(|s| parse_quantity_list(&s))
                .unwrap_or(defaults.rack_quantities),

            dc_quantities: env::var("POWERFLOW_DC_QUANTITIES")
                .map(|s| parse_quantity_list(&s))
                .unwrap_or(defaults.dc_quantities),
        }
    }

    /// The engine-facing slice of this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            repeat_interval_secs: self.repeat_interval_secs,
            reload_debounce_secs: self.reload_debounce_secs,
            rack_quantities: self.rack_quantities.clone(),
            dc_quantities: self.dc_quantities.clone(),
        }
    }
}

fn parse_quantity_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}
