// src/lib.rs
pub mod config;
pub mod pool;
pub mod reaper;

pub use pool::{ConnectionId, MemoryPool, ObservedPool, PoolError, PoolSignal};
pub use reaper::{IdleReaper, ReapEvent, ReaperConfig, ReaperError};
