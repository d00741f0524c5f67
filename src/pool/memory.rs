use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use tracing::trace;

use super::error::PoolError;
use super::types::{ConnectionId, ConnectionListener, ListenerId, PoolSignal};
use super::ObservedPool;

type Listeners = Vec<(ListenerId, ConnectionListener)>;

/// In-process pool that only tracks connection identities.
///
/// Connections are returned to the back of the idle queue and handed out
/// from the back as well, so the front is always the connection that has
/// waited longest.
#[derive(Default)]
pub struct MemoryPool {
    inner: Mutex<MemoryPoolState>,
}

#[derive(Default)]
struct MemoryPoolState {
    next_conn: u64,
    next_listener: u64,
    closed: bool,
    open: HashSet<ConnectionId>,
    idle: VecDeque<ConnectionId>,
    signal_listeners: HashMap<PoolSignal, Listeners>,
    close_listeners: HashMap<ConnectionId, Listeners>,
}

impl MemoryPoolState {
    fn next_listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new connection and parks it in the idle queue.
    pub fn connect(&self) -> Result<ConnectionId, PoolError> {
        let id = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            state.next_conn += 1;
            let id = ConnectionId(state.next_conn);
            state.open.insert(id);
            id
        };

        self.emit(PoolSignal::Established, id);

        let mut state = self.inner.lock();
        // A listener may have closed it already
        if state.open.contains(&id) {
            state.idle.push_back(id);
        }
        Ok(id)
    }

    /// Hands out the most recently returned idle connection.
    pub fn acquire(&self) -> Result<Option<ConnectionId>, PoolError> {
        let id = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            state.idle.pop_back()
        };

        if let Some(id) = id {
            self.emit(PoolSignal::Acquired, id);
        }
        Ok(id)
    }

    /// Returns a connection to the back of the idle queue.
    pub fn release(&self, conn: ConnectionId) -> Result<(), PoolError> {
        {
            let mut state = self.inner.lock();
            if !state.open.contains(&conn) {
                return Err(PoolError::UnknownConnection(conn));
            }
            if !state.idle.contains(&conn) {
                state.idle.push_back(conn);
            }
        }

        self.emit(PoolSignal::Released, conn);
        Ok(())
    }

    /// Marks the pool closed. Open connections are left for their holders.
    pub fn shutdown(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_open(&self, conn: ConnectionId) -> bool {
        self.inner.lock().open.contains(&conn)
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().open.len()
    }

    pub fn idle_connections(&self) -> Vec<ConnectionId> {
        self.inner.lock().idle.iter().copied().collect()
    }

    pub fn listener_count(&self, signal: PoolSignal) -> usize {
        self.inner
            .lock()
            .signal_listeners
            .get(&signal)
            .map_or(0, |l| l.len())
    }

    pub fn closed_listener_count(&self, conn: ConnectionId) -> usize {
        self.inner
            .lock()
            .close_listeners
            .get(&conn)
            .map_or(0, |l| l.len())
    }

    fn emit(&self, signal: PoolSignal, conn: ConnectionId) {
        // Clone out so listeners can call back into the pool
        let listeners: Vec<ConnectionListener> = {
            let state = self.inner.lock();
            state
                .signal_listeners
                .get(&signal)
                .map(|l| l.iter().map(|(_, f)| f.clone()).collect())
                .unwrap_or_default()
        };

        trace!(conn_id = %conn, signal = signal.as_str(), listeners = listeners.len(), "Pool signal");
        for listener in listeners {
            listener(conn);
        }
    }
}

impl ObservedPool for MemoryPool {
    fn subscribe(&self, signal: PoolSignal, listener: ConnectionListener) -> ListenerId {
        let mut state = self.inner.lock();
        let id = state.next_listener_id();
        state
            .signal_listeners
            .entry(signal)
            .or_default()
            .push((id, listener));
        id
    }

    fn unsubscribe(&self, signal: PoolSignal, id: ListenerId) -> bool {
        let mut state = self.inner.lock();
        match state.signal_listeners.get_mut(&signal) {
            Some(listeners) => {
                let before = listeners.len();
                listeners.retain(|(lid, _)| *lid != id);
                listeners.len() != before
            }
            None => false,
        }
    }

    fn on_connection_closed(
        &self,
        conn: ConnectionId,
        listener: ConnectionListener,
    ) -> Option<ListenerId> {
        let mut state = self.inner.lock();
        if !state.open.contains(&conn) {
            return None;
        }
        let id = state.next_listener_id();
        state
            .close_listeners
            .entry(conn)
            .or_default()
            .push((id, listener));
        Some(id)
    }

    fn off_connection_closed(&self, conn: ConnectionId, id: ListenerId) -> bool {
        let mut state = self.inner.lock();
        let Some(listeners) = state.close_listeners.get_mut(&conn) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            state.close_listeners.remove(&conn);
        }
        removed
    }

    fn idle_front(&self) -> Option<ConnectionId> {
        self.inner.lock().idle.front().copied()
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    fn close_connection(&self, conn: ConnectionId) -> Result<(), PoolError> {
        let listeners = {
            let mut state = self.inner.lock();
            if !state.open.remove(&conn) {
                return Err(PoolError::UnknownConnection(conn));
            }
            state.idle.retain(|c| *c != conn);
            state.close_listeners.remove(&conn).unwrap_or_default()
        };

        trace!(conn_id = %conn, listeners = listeners.len(), "Connection closed");
        for (_, listener) in listeners {
            listener(conn);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_idle_queue_is_lifo_with_oldest_at_front() {
        let pool = MemoryPool::new();
        let a = pool.connect().unwrap();
        let b = pool.connect().unwrap();
        assert_eq!(pool.idle_front(), Some(a));

        assert_eq!(pool.acquire().unwrap(), Some(b));
        assert_eq!(pool.idle_connections(), vec![a]);

        pool.release(b).unwrap();
        assert_eq!(pool.idle_connections(), vec![a, b]);
    }

    #[test]
    fn test_closed_listener_fires_once() {
        let pool = MemoryPool::new();
        let conn = pool.connect().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = fired.clone();
        pool.on_connection_closed(
            conn,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        pool.close_connection(conn).unwrap();
        assert!(pool.close_connection(conn).is_err());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(pool.closed_listener_count(conn), 0);
        assert!(pool.idle_front().is_none());
    }

    #[test]
    fn test_unknown_connection_rejects_listener() {
        let pool = MemoryPool::new();
        assert!(pool
            .on_connection_closed(ConnectionId(42), Arc::new(|_| {}))
            .is_none());
        assert!(!pool.off_connection_closed(ConnectionId(42), ListenerId(1)));
    }

    #[test]
    fn test_unsubscribe() {
        let pool = MemoryPool::new();
        let id = pool.subscribe(PoolSignal::Acquired, Arc::new(|_| {}));
        assert_eq!(pool.listener_count(PoolSignal::Acquired), 1);
        assert!(pool.unsubscribe(PoolSignal::Acquired, id));
        assert!(!pool.unsubscribe(PoolSignal::Acquired, id));
        assert_eq!(pool.listener_count(PoolSignal::Acquired), 0);
    }

    #[test]
    fn test_shutdown_rejects_new_work() {
        let pool = MemoryPool::new();
        let conn = pool.connect().unwrap();
        pool.shutdown();
        assert!(pool.is_closed());
        assert_eq!(pool.connect(), Err(PoolError::Closed));
        assert_eq!(pool.acquire(), Err(PoolError::Closed));
        assert!(pool.is_open(conn));
    }
}
