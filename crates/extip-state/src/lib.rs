//! extip-state — embedded state store for the external-address controller.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for address pools, subnets, external addresses, address mappings,
//! and the instance/tenant records the allocator resolves against.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! External addresses are keyed by the address itself, which makes an
//! address unique across every pool. Subnets use `{pool_id}:{subnet_id}`
//! keys so a pool's subnets can be found with a prefix scan.
//!
//! Address claims run inside a single write transaction. redb serializes
//! writers, so two callers racing for the last free address in a pool see
//! exactly one success.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
