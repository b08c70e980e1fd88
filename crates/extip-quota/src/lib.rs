//! extip-quota — admission control for per-tenant resource capacity.
//!
//! A single [`QuotaActor`] task owns every usage counter. Callers hold a
//! cloneable [`QuotaHandle`] and talk to the actor over a bounded channel;
//! each request carries a oneshot reply, so `consume` suspends until the
//! actor has produced an allowed/denied decision.
//!
//! ```text
//! AddressAllocator ──consume/release──► QuotaHandle ──mpsc──► QuotaActor
//!                  ◄────── QuotaDecision ── oneshot ◄────────┘
//! ```
//!
//! The allocator depends only on the [`QuotaService`] trait, so tests may
//! substitute their own implementation.

pub mod actor;
pub mod error;
pub mod service;

pub use actor::{QuotaActor, QuotaHandle, QuotaLimits};
pub use error::{QuotaError, QuotaResult};
pub use service::{QuotaDecision, QuotaService};
