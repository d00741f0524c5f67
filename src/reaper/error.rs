use thiserror::Error;

use crate::pool::PoolError;

#[derive(Error, Debug)]
pub enum ReaperError {
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("No tokio runtime available to drive the reaper")]
    NoRuntime,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
