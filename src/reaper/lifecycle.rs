use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::pool::{ConnectionId, ConnectionListener, ListenerId, ObservedPool};

use super::tracker::UsageTracker;

/// Keeps one closed-listener per tracked connection and purges the
/// connection's state when it fires.
pub struct LifecycleObserver<P: ObservedPool> {
    pool: Arc<P>,
    tracker: Arc<UsageTracker>,
    handles: DashMap<ConnectionId, ListenerId>,
}

impl<P: ObservedPool> LifecycleObserver<P> {
    pub fn new(pool: Arc<P>, tracker: Arc<UsageTracker>) -> Self {
        Self {
            pool,
            tracker,
            handles: DashMap::new(),
        }
    }

    pub fn attach(self: &Arc<Self>, conn: ConnectionId) {
        // Never leave two listeners on one connection
        if let Some((_, previous)) = self.handles.remove(&conn) {
            self.pool.off_connection_closed(conn, previous);
        }

        let observer: Weak<Self> = Arc::downgrade(self);
        let listener: ConnectionListener = Arc::new(move |conn| {
            if let Some(observer) = observer.upgrade() {
                observer.on_closed(conn);
            }
        });

        match self.pool.on_connection_closed(conn, listener) {
            Some(id) => {
                self.handles.insert(conn, id);
                trace!(conn_id = %conn, "Closed listener attached");
            }
            None => {
                debug!(conn_id = %conn, "Connection already gone, not tracking");
                self.tracker.forget(conn);
            }
        }
    }

    /// Attaches unless a listener is already in place. Covers connections
    /// established before the reaper started listening.
    pub fn ensure_attached(self: &Arc<Self>, conn: ConnectionId) {
        if !self.handles.contains_key(&conn) {
            self.attach(conn);
        }
    }

    fn on_closed(&self, conn: ConnectionId) {
        self.tracker.forget(conn);
        if let Some((_, id)) = self.handles.remove(&conn) {
            // The pool has usually dropped a one-shot listener already
            self.pool.off_connection_closed(conn, id);
        }
        trace!(conn_id = %conn, "Connection closed, tracking dropped");
    }

    /// Detaches every listener still registered. Returns how many were live.
    pub fn detach_all(&self) -> usize {
        let handles: Vec<(ConnectionId, ListenerId)> = self
            .handles
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        let mut detached = 0;
        for (conn, id) in handles {
            if self.handles.remove_if(&conn, |_, v| *v == id).is_some() {
                self.pool.off_connection_closed(conn, id);
                detached += 1;
            }
        }
        detached
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
