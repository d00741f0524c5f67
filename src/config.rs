use serde::Deserialize;
use std::path::Path;

use crate::reaper::{ConfigError, ReaperConfig};

const DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Shape of the simulated load driven by the demo binary.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_burst_connections")]
    pub burst_connections: usize,
    #[serde(default = "default_keep_warm")]
    pub keep_warm: usize,
    #[serde(default = "default_warm_interval")]
    pub warm_interval_ms: u64,
}

fn default_burst_connections() -> usize {
    8
}

fn default_keep_warm() -> usize {
    2
}

fn default_warm_interval() -> u64 {
    500
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            burst_connections: default_burst_connections(),
            keep_warm: default_keep_warm(),
            warm_interval_ms: default_warm_interval(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.reaper.validate()?;
        Ok(config)
    }

    /// Reads `path`, or the built-in `default_config.toml` when there is no
    /// file there. Any other read error is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_str = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using built-in defaults");
                DEFAULT_CONFIG.to_string()
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml_str(&config_str)
    }
}
