//! Remote agent error types.

use thiserror::Error;

/// Errors from programming a tenant's network agent.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tenant {0} has no network agent")]
    NoAgent(String),

    #[error("agent {agent} unreachable: {reason}")]
    Unreachable { agent: String, reason: String },

    #[error("agent {agent} rejected request: {status}")]
    Rejected { agent: String, status: u16 },

    #[error("failed to build agent request: {0}")]
    Request(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
