use thiserror::Error;

use super::types::ConnectionId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Pool is closed")]
    Closed,

    #[error("Backend error: {0}")]
    Backend(String),
}
