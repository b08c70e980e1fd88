//! The admission-control interface consumed by the allocator.

use async_trait::async_trait;
use extip_core::ResourceDescriptor;

use crate::error::QuotaResult;

/// Outcome of a capacity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    allowed: bool,
    /// Usage after the request was applied (unchanged when denied).
    pub usage: u32,
    pub limit: Option<u32>,
}

impl QuotaDecision {
    pub fn new(allowed: bool, usage: u32, limit: Option<u32>) -> Self {
        Self {
            allowed,
            usage,
            limit,
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }
}

/// Per-tenant resource admission.
///
/// `consume` either reserves the requested units and reports `allowed`, or
/// changes nothing and reports denied. Every allowed `consume` must be matched
/// by at most one `release` of the same descriptor.
#[async_trait]
pub trait QuotaService: Send + Sync {
    async fn consume(
        &self,
        tenant_id: &str,
        resource: ResourceDescriptor,
    ) -> QuotaResult<QuotaDecision>;

    async fn release(&self, tenant_id: &str, resource: ResourceDescriptor) -> QuotaResult<()>;
}
