use std::time::Duration;

use dashmap::DashMap;
use prometheus::IntGauge;
use tokio::time::Instant;

use crate::pool::ConnectionId;

use super::metrics;

/// Last-use timestamps keyed by connection.
pub struct UsageTracker {
    last_used: DashMap<ConnectionId, Instant>,
    // Shared across trackers, so only ever moved by deltas
    tracked: IntGauge,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::with_gauge(metrics::TRACKED_CONNECTIONS.clone())
    }
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gauge(tracked: IntGauge) -> Self {
        Self {
            last_used: DashMap::new(),
            tracked,
        }
    }

    pub fn record_usage(&self, conn: ConnectionId) {
        if self.last_used.insert(conn, Instant::now()).is_none() {
            self.tracked.inc();
        }
    }

    pub fn forget(&self, conn: ConnectionId) {
        if self.last_used.remove(&conn).is_some() {
            self.tracked.dec();
        }
    }

    /// `None` means the connection was never observed, which callers must
    /// treat as unknown age rather than stale.
    pub fn idle_for(&self, conn: ConnectionId, now: Instant) -> Option<Duration> {
        self.last_used
            .get(&conn)
            .map(|last| now.saturating_duration_since(*last))
    }

    pub fn len(&self) -> usize {
        self.last_used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_used.is_empty()
    }

    pub fn clear(&self) {
        let mut removed = 0;
        self.last_used.retain(|_, _| {
            removed += 1;
            false
        });
        self.tracked.sub(removed);
    }
}
