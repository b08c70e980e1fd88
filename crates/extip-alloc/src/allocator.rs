//! AddressAllocator — the quota-gated mapping protocol.
//!
//! `map_address` spans three systems that fail independently: the quota
//! service, the store, and the tenant's network agent. Once a quota unit is
//! reserved, every failure exit releases it exactly once, and once the store
//! has committed a mapping, every later failure removes it again.
//!
//! Compensation is best effort. A failed compensating unmap is logged and
//! absorbed; the caller always sees the error that triggered the rollback.
//! An agent that was never told about the unmap can only be repaired by
//! reconciliation.

use std::sync::Arc;

use tracing::{debug, info, warn};

use extip_agent::RemoteAgentClient;
use extip_core::ResourceDescriptor;
use extip_quota::QuotaService;
use extip_state::{Instance, MappedIp, Pool, Tenant};

use crate::directory::{Store, TenantDirectory};
use crate::error::{AllocError, AllocResult};
use crate::links::{LinkBuilder, Scope};

/// One quota unit checked out for a mapping attempt.
///
/// Consumed by exactly one of [`Reservation::commit`] or
/// [`Reservation::release`], so a unit can never be released twice.
#[must_use = "a reservation must be committed or released"]
struct Reservation<'a> {
    quota: &'a dyn QuotaService,
    tenant_id: String,
    resource: ResourceDescriptor,
}

impl Reservation<'_> {
    /// Keep the unit; it is returned later by `release_address`.
    fn commit(self) {
        debug!(tenant = %self.tenant_id, "quota reservation committed");
    }

    async fn release(self) {
        match self.quota.release(&self.tenant_id, self.resource).await {
            Ok(()) => debug!(tenant = %self.tenant_id, "quota reservation released"),
            Err(e) => warn!(tenant = %self.tenant_id, error = %e, "failed to release quota reservation"),
        }
    }
}

/// Maps external addresses to instances.
#[derive(Clone)]
pub struct AddressAllocator {
    store: Arc<dyn Store>,
    tenants: Arc<dyn TenantDirectory>,
    quota: Arc<dyn QuotaService>,
    agent: Arc<dyn RemoteAgentClient>,
    links: LinkBuilder,
}

impl AddressAllocator {
    pub fn new(
        store: Arc<dyn Store>,
        tenants: Arc<dyn TenantDirectory>,
        quota: Arc<dyn QuotaService>,
        agent: Arc<dyn RemoteAgentClient>,
        links: LinkBuilder,
    ) -> Self {
        Self {
            store,
            tenants,
            quota,
            agent,
            links,
        }
    }

    /// Map a free external address to an instance.
    ///
    /// In tenant scope the instance must belong to the tenant. With a pool
    /// name only that pool is tried, whatever its cached free count; without
    /// one the first pool with free addresses is used.
    pub async fn map_address(
        &self,
        scope: &Scope,
        pool_name: Option<&str>,
        instance_id: &str,
    ) -> AllocResult<MappedIp> {
        let instance = match scope {
            Scope::Admin => self.store.get_instance(instance_id)?,
            Scope::Tenant(tenant_id) => self.store.get_tenant_instance(tenant_id, instance_id)?,
        };

        // Once quota is reserved the attempt runs to success or full
        // compensation on its own task, whether or not the caller still waits.
        let this = self.clone();
        let pool_name = pool_name.map(str::to_string);
        let attempt =
            tokio::spawn(async move { this.reserve_and_map(pool_name.as_deref(), &instance).await });
        let mapping = attempt
            .await
            .map_err(|e| AllocError::Interrupted(e.to_string()))??;
        Ok(self.links.mapped_ip(mapping, scope))
    }

    /// Remove the remote program for a mapped address.
    ///
    /// Neither the store record nor the quota unit is touched; callers that
    /// want a full teardown use [`AddressAllocator::release_address`].
    pub async fn unmap_address(&self, address: &str) -> AllocResult<MappedIp> {
        let mapping = self.store.get_mapped_ip(address)?;
        let tenant = self.resolve_agent(&mapping.tenant_id)?;
        self.agent.unmap_external_ip(&tenant, &mapping).await?;
        Ok(mapping)
    }

    /// Fully tear down a mapping: agent, then store, then quota.
    ///
    /// `key` is either the external address or the mapping ID. An agent
    /// failure aborts before anything else changes.
    pub async fn release_address(&self, scope: &Scope, key: &str) -> AllocResult<()> {
        let mapping = self.find_mapping(scope, key)?;
        self.unmap_address(&mapping.external_ip).await?;
        self.store.unmap_external_ip(&mapping.external_ip)?;

        if let Err(e) = self
            .quota
            .release(&mapping.tenant_id, ResourceDescriptor::external_ip())
            .await
        {
            warn!(tenant = %mapping.tenant_id, error = %e, "failed to release quota after unmap");
        }
        info!(
            tenant = %mapping.tenant_id,
            address = %mapping.external_ip,
            "external address released"
        );
        Ok(())
    }

    /// List mappings visible to the scope, with links.
    pub fn list_mapped_addresses(&self, scope: &Scope) -> AllocResult<Vec<MappedIp>> {
        Ok(self
            .store
            .get_mapped_ips(scope.tenant())?
            .into_iter()
            .map(|mapping| self.links.mapped_ip(mapping, scope))
            .collect())
    }

    /// Show one mapping by address or mapping ID, with links.
    pub fn show_mapped_address(&self, scope: &Scope, key: &str) -> AllocResult<MappedIp> {
        let mapping = self.find_mapping(scope, key)?;
        Ok(self.links.mapped_ip(mapping, scope))
    }

    async fn reserve_and_map(
        &self,
        pool_name: Option<&str>,
        instance: &Instance,
    ) -> AllocResult<MappedIp> {
        let reservation = self.reserve(&instance.tenant_id).await?;

        match self.commit_mapping(pool_name, instance).await {
            Ok(mapping) => {
                reservation.commit();
                info!(
                    tenant = %mapping.tenant_id,
                    instance = %mapping.instance_id,
                    address = %mapping.external_ip,
                    pool = %mapping.pool_name,
                    "external address mapped"
                );
                Ok(mapping)
            }
            Err(e) => {
                reservation.release().await;
                Err(e)
            }
        }
    }

    async fn reserve(&self, tenant_id: &str) -> AllocResult<Reservation<'_>> {
        let resource = ResourceDescriptor::external_ip();
        let decision = self.quota.consume(tenant_id, resource).await?;
        if !decision.allowed() {
            warn!(tenant = %tenant_id, usage = decision.usage, limit = ?decision.limit, "external ip quota exceeded");
            return Err(AllocError::QuotaExceeded(tenant_id.to_string()));
        }
        Ok(Reservation {
            quota: self.quota.as_ref(),
            tenant_id: tenant_id.to_string(),
            resource,
        })
    }

    /// Steps after the reservation: select, claim, program.
    async fn commit_mapping(
        &self,
        pool_name: Option<&str>,
        instance: &Instance,
    ) -> AllocResult<MappedIp> {
        let pool = self.select_pool(pool_name)?;
        let mapping = self.store.map_external_ip(&pool.id, &instance.id)?;

        if let Err(e) = self.program_agent(&mapping).await {
            warn!(address = %mapping.external_ip, error = %e, "agent programming failed, rolling back");
            self.roll_back(&mapping).await;
            return Err(e);
        }
        Ok(mapping)
    }

    fn select_pool(&self, pool_name: Option<&str>) -> AllocResult<Pool> {
        let pools = self.store.get_pools()?;
        let selected = match pool_name {
            Some(name) => pools.into_iter().find(|p| p.name == name),
            None => pools.into_iter().find(|p| p.free > 0),
        };
        selected.ok_or_else(|| {
            AllocError::PoolEmpty(pool_name.unwrap_or("any pool").to_string())
        })
    }

    /// The tenant record, provided it is bound to a network agent.
    fn resolve_agent(&self, tenant_id: &str) -> AllocResult<Tenant> {
        let tenant = self.tenants.get_tenant(tenant_id)?;
        if tenant.agent.is_none() {
            return Err(AllocError::NotFound(format!(
                "network agent for tenant {tenant_id}"
            )));
        }
        Ok(tenant)
    }

    async fn program_agent(&self, mapping: &MappedIp) -> AllocResult<()> {
        let tenant = self.resolve_agent(&mapping.tenant_id)?;
        self.agent.map_external_ip(&tenant, mapping).await?;
        Ok(())
    }

    /// Undo a committed claim. Failures are logged, never returned.
    async fn roll_back(&self, mapping: &MappedIp) {
        if let Err(e) = self.unmap_address(&mapping.external_ip).await {
            warn!(
                address = %mapping.external_ip,
                error = %e,
                "compensating agent unmap failed, agent may need reconciliation"
            );
        }
        if let Err(e) = self.store.unmap_external_ip(&mapping.external_ip) {
            warn!(
                address = %mapping.external_ip,
                error = %e,
                "compensating store unmap failed, mapping is stranded"
            );
        }
    }

    fn find_mapping(&self, scope: &Scope, key: &str) -> AllocResult<MappedIp> {
        let mapping = match self.store.get_mapped_ip(key) {
            Ok(mapping) => mapping,
            Err(e) if e.is_not_found() => self
                .store
                .get_mapped_ips(scope.tenant())?
                .into_iter()
                .find(|m| m.id == key)
                .ok_or_else(|| AllocError::NotFound(format!("mapping {key}")))?,
            Err(e) => return Err(e.into()),
        };

        if scope.tenant().is_some_and(|tenant| tenant != mapping.tenant_id) {
            return Err(AllocError::NotFound(format!("mapping {key}")));
        }
        Ok(mapping)
    }
}
