use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

lazy_static::lazy_static! {
    pub static ref CONNECTIONS_REAPED: IntCounter = register_int_counter!(
        "pool_reaper_connections_reaped_total",
        "Total number of idle connections reaped"
    ).unwrap();

    pub static ref CLOSE_FAILURES: IntCounter = register_int_counter!(
        "pool_reaper_close_failures_total",
        "Total number of reaped connections the pool failed to close"
    ).unwrap();

    pub static ref TRACKED_CONNECTIONS: IntGauge = register_int_gauge!(
        "pool_reaper_tracked_connections",
        "Number of connections with a recorded last-use time"
    ).unwrap();
}

/// Handles one reaper reports through. Clones share the underlying value,
/// so every reaper built with `default()` adds into the same series.
#[derive(Clone)]
pub struct ReaperMetrics {
    pub reaped: IntCounter,
    pub close_failures: IntCounter,
    pub tracked: IntGauge,
}

impl Default for ReaperMetrics {
    fn default() -> Self {
        Self {
            reaped: CONNECTIONS_REAPED.clone(),
            close_failures: CLOSE_FAILURES.clone(),
            tracked: TRACKED_CONNECTIONS.clone(),
        }
    }
}

impl ReaperMetrics {
    /// Unregistered metrics, private to one reaper.
    #[cfg(test)]
    pub(crate) fn unregistered() -> Self {
        Self {
            reaped: IntCounter::new("reaped", "reaped").unwrap(),
            close_failures: IntCounter::new("close_failures", "close failures").unwrap(),
            tracked: IntGauge::new("tracked", "tracked").unwrap(),
        }
    }
}
