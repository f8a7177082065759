//! Configuration loading from TOML files
//!
//! The binary picks the file (`--config`, then `CONFIG_FILE`, then
//! `config/dev.toml`); an unusable file falls back to defaults.

use crate::domain::types::GeoPoint;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    /// Requested interval between position fixes
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms() }
    }
}

fn default_interval_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Title of the ongoing tracking notification
    #[serde(default = "default_presence_title")]
    pub title: String,
    /// Body shown until the first sample arrives
    #[serde(default = "default_unknown_text")]
    pub unknown_text: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { title: default_presence_title(), unknown_text: default_unknown_text() }
    }
}

fn default_presence_title() -> String {
    "Tracking location...".to_string()
}

fn default_unknown_text() -> String {
    "Location unknown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Collection holding one record per vehicle
    #[serde(default = "default_tracking_collection")]
    pub tracking_collection: String,
    /// Collection holding user profiles
    #[serde(default = "default_users_collection")]
    pub users_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tracking_collection: default_tracking_collection(),
            users_collection: default_users_collection(),
        }
    }
}

fn default_tracking_collection() -> String {
    "tracking".to_string()
}

fn default_users_collection() -> String {
    "usersData".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Pending start/stop commands before callers wait
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { command_buffer: default_command_buffer() }
    }
}

fn default_command_buffer() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Periodic metrics log interval (0 to disable)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_true")]
    pub permission_granted: bool,
    #[serde(default = "default_true")]
    pub gps_enabled: bool,
    #[serde(default = "default_true")]
    pub network_enabled: bool,
    /// Vehicle identifier the demo driver publishes under
    #[serde(default = "default_vehicle")]
    pub vehicle: String,
    /// Route replayed by the simulated provider, as `[lat, lon]` pairs
    #[serde(default = "default_route")]
    pub route: Vec<[f64; 2]>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            permission_granted: true,
            gps_enabled: true,
            network_enabled: true,
            vehicle: default_vehicle(),
            route: default_route(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_vehicle() -> String {
    "ABC123".to_string()
}

fn default_route() -> Vec<[f64; 2]> {
    vec![[10.0, 20.0], [10.1, 20.1], [10.2, 20.2]]
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    location_interval_ms: u64,
    presence_title: String,
    presence_unknown_text: String,
    tracking_collection: String,
    users_collection: String,
    command_buffer: usize,
    metrics_interval_secs: u64,
    sim_permission_granted: bool,
    sim_gps_enabled: bool,
    sim_network_enabled: bool,
    sim_vehicle: String,
    sim_route: Vec<GeoPoint>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            location_interval_ms: toml_config.location.interval_ms,
            presence_title: toml_config.presence.title,
            presence_unknown_text: toml_config.presence.unknown_text,
            tracking_collection: toml_config.store.tracking_collection,
            users_collection: toml_config.store.users_collection,
            // A zero-capacity mpsc channel panics on creation
            command_buffer: toml_config.service.command_buffer.max(1),
            metrics_interval_secs: toml_config.metrics.interval_secs,
            sim_permission_granted: toml_config.simulation.permission_granted,
            sim_gps_enabled: toml_config.simulation.gps_enabled,
            sim_network_enabled: toml_config.simulation.network_enabled,
            sim_vehicle: toml_config.simulation.vehicle,
            sim_route: toml_config
                .simulation
                .route
                .into_iter()
                .map(|[lat, lon]| GeoPoint::new(lat, lon))
                .collect(),
            config_file,
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load a specific file, falling back to defaults when it is unusable
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms)
    }

    pub fn location_interval_ms(&self) -> u64 {
        self.location_interval_ms
    }

    pub fn presence_title(&self) -> &str {
        &self.presence_title
    }

    pub fn presence_unknown_text(&self) -> &str {
        &self.presence_unknown_text
    }

    pub fn tracking_collection(&self) -> &str {
        &self.tracking_collection
    }

    pub fn users_collection(&self) -> &str {
        &self.users_collection
    }

    pub fn command_buffer(&self) -> usize {
        self.command_buffer
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn sim_permission_granted(&self) -> bool {
        self.sim_permission_granted
    }

    pub fn sim_gps_enabled(&self) -> bool {
        self.sim_gps_enabled
    }

    pub fn sim_network_enabled(&self) -> bool {
        self.sim_network_enabled
    }

    pub fn sim_vehicle(&self) -> &str {
        &self.sim_vehicle
    }

    pub fn sim_route(&self) -> &[GeoPoint] {
        &self.sim_route
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the acquisition interval
    pub fn with_location_interval_ms(mut self, ms: u64) -> Self {
        self.location_interval_ms = ms;
        self
    }
}
