//! extip-alloc — external address pools and the mapping protocol.
//!
//! [`PoolManager`] owns pool lifecycle: create, list, show, delete, and
//! adding or removing subnets and individual addresses. [`AddressAllocator`]
//! binds a free external address to an instance. A single mapping touches
//! three systems that fail independently, so every failure after the quota
//! reservation unwinds what was done before it.
//!
//! # Mapping protocol
//!
//! ```text
//! resolve instance ──► reserve quota ──► select pool ──► claim address (store)
//!                                                             │
//!      release quota ◄── unmap (store) ◄── unmap (agent) ◄── fail?
//!                                                             │
//!                                  resolve tenant agent ──► program agent
//! ```
//!
//! All collaborators are injected as trait objects ([`Store`],
//! [`TenantDirectory`], [`QuotaService`](extip_quota::QuotaService),
//! [`RemoteAgentClient`](extip_agent::RemoteAgentClient)).

pub mod allocator;
pub mod directory;
pub mod error;
pub mod links;
pub mod pools;

pub use allocator::AddressAllocator;
pub use directory::{Store, TenantDirectory};
pub use error::{AllocError, AllocResult};
pub use links::{LinkBuilder, Scope};
pub use pools::PoolManager;
