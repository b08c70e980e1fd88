//! Narrow views of the state store consumed by the allocator.
//!
//! `StateStore` implements both traits; tests may substitute their own.

use extip_state::*;

/// Persistence operations needed by pool management and the mapping protocol.
///
/// Every call is individually atomic. Missing records are reported as
/// `StateError::NotFound`.
pub trait Store: Send + Sync {
    fn get_pools(&self) -> StateResult<Vec<Pool>>;
    fn get_pool(&self, pool_id: &str) -> StateResult<Pool>;
    fn add_pool(&self, pool: &PoolRecord) -> StateResult<()>;
    fn delete_pool(&self, pool_id: &str) -> StateResult<()>;

    fn add_external_subnet(&self, pool_id: &str, cidr: &str) -> StateResult<ExternalSubnet>;
    fn add_external_ips(&self, pool_id: &str, ips: &[String]) -> StateResult<Vec<ExternalIp>>;
    fn delete_subnet(&self, pool_id: &str, subnet_id: &str) -> StateResult<()>;
    fn delete_external_ip(&self, pool_id: &str, ip_id: &str) -> StateResult<()>;

    fn get_mapped_ips(&self, tenant_id: Option<&str>) -> StateResult<Vec<MappedIp>>;
    fn get_mapped_ip(&self, address: &str) -> StateResult<MappedIp>;
    /// Atomically claim one free address of the pool for the instance.
    fn map_external_ip(&self, pool_id: &str, instance_id: &str) -> StateResult<MappedIp>;
    fn unmap_external_ip(&self, address: &str) -> StateResult<MappedIp>;

    fn get_instance(&self, instance_id: &str) -> StateResult<Instance>;
    fn get_tenant_instance(&self, tenant_id: &str, instance_id: &str) -> StateResult<Instance>;
}

/// Resolves a tenant to its network-agent binding.
pub trait TenantDirectory: Send + Sync {
    fn get_tenant(&self, tenant_id: &str) -> StateResult<Tenant>;
}

impl Store for StateStore {
    fn get_pools(&self) -> StateResult<Vec<Pool>> {
        self.list_pools()
    }

    fn get_pool(&self, pool_id: &str) -> StateResult<Pool> {
        StateStore::get_pool(self, pool_id)
    }

    fn add_pool(&self, pool: &PoolRecord) -> StateResult<()> {
        StateStore::add_pool(self, pool)
    }

    fn delete_pool(&self, pool_id: &str) -> StateResult<()> {
        StateStore::delete_pool(self, pool_id)
    }

    fn add_external_subnet(&self, pool_id: &str, cidr: &str) -> StateResult<ExternalSubnet> {
        StateStore::add_external_subnet(self, pool_id, cidr)
    }

    fn add_external_ips(&self, pool_id: &str, ips: &[String]) -> StateResult<Vec<ExternalIp>> {
        StateStore::add_external_ips(self, pool_id, ips)
    }

    fn delete_subnet(&self, pool_id: &str, subnet_id: &str) -> StateResult<()> {
        StateStore::delete_subnet(self, pool_id, subnet_id)
    }

    fn delete_external_ip(&self, pool_id: &str, ip_id: &str) -> StateResult<()> {
        StateStore::delete_external_ip(self, pool_id, ip_id)
    }

    fn get_mapped_ips(&self, tenant_id: Option<&str>) -> StateResult<Vec<MappedIp>> {
        StateStore::get_mapped_ips(self, tenant_id)
    }

    fn get_mapped_ip(&self, address: &str) -> StateResult<MappedIp> {
        StateStore::get_mapped_ip(self, address)
    }

    fn map_external_ip(&self, pool_id: &str, instance_id: &str) -> StateResult<MappedIp> {
        StateStore::map_external_ip(self, pool_id, instance_id)
    }

    fn unmap_external_ip(&self, address: &str) -> StateResult<MappedIp> {
        StateStore::unmap_external_ip(self, address)
    }

    fn get_instance(&self, instance_id: &str) -> StateResult<Instance> {
        StateStore::get_instance(self, instance_id)
    }

    fn get_tenant_instance(&self, tenant_id: &str, instance_id: &str) -> StateResult<Instance> {
        StateStore::get_tenant_instance(self, tenant_id, instance_id)
    }
}

impl TenantDirectory for StateStore {
    fn get_tenant(&self, tenant_id: &str) -> StateResult<Tenant> {
        StateStore::get_tenant(self, tenant_id)
    }
}
