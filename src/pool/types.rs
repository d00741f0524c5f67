use std::fmt;
use std::sync::Arc;

/// Stable identity the pool assigns when a connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle returned by a listener registration, used to detach it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolSignal {
    /// A new physical connection was opened.
    Established,
    /// A connection was handed out of the idle set.
    Acquired,
    /// A connection went back into the idle set.
    Released,
}

impl PoolSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolSignal::Established => "established",
            PoolSignal::Acquired => "acquired",
            PoolSignal::Released => "released",
        }
    }
}

pub type ConnectionListener = Arc<dyn Fn(ConnectionId) + Send + Sync>;
