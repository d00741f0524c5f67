pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod metrics;
pub mod tracker;
pub mod types;

pub use config::ReaperConfig;
pub use error::{ConfigError, ReaperError};
pub use manager::IdleReaper;
pub use types::ReapEvent;
