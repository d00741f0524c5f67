use std::time::Duration;

use crate::pool::ConnectionId;

/// Emitted once per eviction, before the close command is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapEvent {
    pub connection: ConnectionId,
    pub idle_for: Duration,
}
