//! The narrow surface the reaper needs from a connection pool.
//!
//! Adapters for concrete pool libraries implement [`ObservedPool`]; the
//! reaper never reaches into a pool's internals beyond this trait.

pub mod error;
pub mod memory;
pub mod types;

pub use error::PoolError;
pub use memory::MemoryPool;
pub use types::{ConnectionId, ConnectionListener, ListenerId, PoolSignal};

pub trait ObservedPool: Send + Sync + 'static {
    /// Registers `listener` for every future occurrence of `signal`.
    fn subscribe(&self, signal: PoolSignal, listener: ConnectionListener) -> ListenerId;

    /// Returns `false` if `id` was not registered for `signal`.
    fn unsubscribe(&self, signal: PoolSignal, id: ListenerId) -> bool;

    /// Registers a one-shot listener fired when `conn` is torn down.
    /// Returns `None` if the pool does not know `conn` (already closed).
    fn on_connection_closed(
        &self,
        conn: ConnectionId,
        listener: ConnectionListener,
    ) -> Option<ListenerId>;

    /// Detaching a listener that already fired or was removed is a no-op.
    fn off_connection_closed(&self, conn: ConnectionId, id: ListenerId) -> bool;

    /// The least recently returned idle connection, if any.
    fn idle_front(&self) -> Option<ConnectionId>;

    fn is_closed(&self) -> bool;

    /// Asks the connection to terminate. The pool is expected to raise the
    /// closed signal for it and drop it from the idle queue.
    fn close_connection(&self, conn: ConnectionId) -> Result<(), PoolError>;
}
