use serde::Deserialize;
use std::time::Duration;

use super::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReaperConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_reap_interval")]
    pub reap_interval_ms: u64,
}

fn default_idle_timeout() -> u64 {
    15 * 60 * 1000 // 15 minutes
}

fn default_reap_interval() -> u64 {
    1000
}

fn ceil_millis(d: Duration) -> u64 {
    let millis = d.as_millis() + u128::from(d.subsec_nanos() % 1_000_000 != 0);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout(),
            reap_interval_ms: default_reap_interval(),
        }
    }
}

impl ReaperConfig {
    /// Sub-millisecond parts round up, so a non-zero duration never
    /// becomes a zero setting.
    pub fn new(idle_timeout: Duration, reap_interval: Duration) -> Self {
        Self {
            idle_timeout_ms: ceil_millis(idle_timeout),
            reap_interval_ms: ceil_millis(reap_interval),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // sleep(0) would spin the ticker
        if self.reap_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "reap_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
