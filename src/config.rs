//! Configuration management

use crate::error::Result;
use crate::middleware::MonitorMask;
use crate::types::UnixNanos;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub replay: ReplaySettings,
    pub bars: BarConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Ingress queue capacity.
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Tick recording path.
    pub path: Option<String>,
    /// Skip records before this instant.
    pub start: Option<DateTime<Utc>>,
    /// Stop at the first record after this instant.
    pub end: Option<DateTime<Utc>>,
}

impl ReplaySettings {
    pub fn start_nanos(&self) -> Option<UnixNanos> {
        self.start.and_then(|dt| dt.timestamp_nanos_opt())
    }

    pub fn end_nanos(&self) -> Option<UnixNanos> {
        self.end.and_then(|dt| dt.timestamp_nanos_opt())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BarConfig {
    /// Bar period in seconds.
    pub period_secs: u64,
}

impl BarConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Event kinds the monitor middleware reports
    /// (`"ticks"`, `"bars"`, ..., `"all"`).
    pub events: Vec<String>,
}

impl MonitorConfig {
    pub fn mask(&self) -> Result<MonitorMask> {
        MonitorMask::from_names(&self.events)
    }
}

impl Config {
    /// Load configuration from file, with `TICKFLOW_*` environment
    /// overrides.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TICKFLOW"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    /// Load from default locations, falling back to built-in defaults when
    /// no file exists.
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = ["config.toml", "~/.config/tickflow/config.toml"];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

impl Default for BarConfig {
    fn default() -> Self {
        Self { period_secs: 60 } // 1-minute bars
    }
}
