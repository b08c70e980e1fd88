//! Allocator error types.

use thiserror::Error;

use extip_agent::AgentError;
use extip_quota::QuotaError;
use extip_state::StateError;

/// Errors surfaced by pool management and the mapping protocol.
#[derive(Debug, Error)]
pub enum AllocError {
    #[error("pool name already in use: {0}")]
    DuplicatePoolName(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no external address available: {0}")]
    PoolEmpty(String),

    #[error("external ip quota exceeded for tenant {0}")]
    QuotaExceeded(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("addresses still mapped: {0}")]
    InUse(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("mapping attempt interrupted: {0}")]
    Interrupted(String),

    #[error("remote agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("quota service error: {0}")]
    Quota(#[from] QuotaError),

    #[error("state store error: {0}")]
    State(StateError),
}

impl From<StateError> for AllocError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => AllocError::NotFound(what),
            StateError::DuplicateName(name) => AllocError::DuplicatePoolName(name),
            StateError::PoolEmpty(pool) => AllocError::PoolEmpty(pool),
            StateError::InUse(what) => AllocError::InUse(what),
            StateError::InvalidAddress(addr) => AllocError::InvalidAddress(addr),
            StateError::AddressInUse(addr) => AllocError::InUse(addr),
            StateError::Reserved(id) => AllocError::BadRequest(format!("reserved identifier: {id}")),
            other => AllocError::State(other),
        }
    }
}

pub type AllocResult<T> = Result<T, AllocError>;
