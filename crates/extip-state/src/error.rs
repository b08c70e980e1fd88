//! Error types for the extip state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("pool name already in use: {0}")]
    DuplicateName(String),

    #[error("address already registered: {0}")]
    AddressInUse(String),

    #[error("addresses still mapped: {0}")]
    InUse(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no free address in pool: {0}")]
    PoolEmpty(String),

    #[error("reserved identifier: {0}")]
    Reserved(String),
}

impl StateError {
    /// Whether this error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StateError::NotFound(_))
    }
}
