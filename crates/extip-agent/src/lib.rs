//! extip-agent — remote programming of tenant network agents.
//!
//! Each tenant has a network agent that performs address translation for its
//! instances. The controller tells the agent to install or remove a
//! translation for a [`MappedIp`](extip_state::MappedIp). Calls are never
//! retried here; the allocator decides what a failure means.
//!
//! # Wire format
//!
//! ```text
//! POST   http://{agent}/external-ips            body: MappedIp (JSON)
//! DELETE http://{agent}/external-ips/{address}  body: MappedIp (JSON)
//! ```
//!
//! Any 2xx response is success. Other statuses are [`AgentError::Rejected`];
//! connection, handshake, and timeout failures are [`AgentError::Unreachable`].

pub mod client;
pub mod error;

pub use client::{HttpAgentClient, RemoteAgentClient};
pub use error::{AgentError, AgentResult};
