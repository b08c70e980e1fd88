//! Quota service error types.

use thiserror::Error;

/// Errors raised while talking to the quota service.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// The actor task has stopped and no longer accepts requests.
    #[error("quota service unavailable")]
    Unavailable,
}

pub type QuotaResult<T> = Result<T, QuotaError>;
