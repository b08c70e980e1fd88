//! PoolManager — pool lifecycle and address membership.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use extip_state::{Pool, PoolRecord};

use crate::directory::Store;
use crate::error::{AllocError, AllocResult};
use crate::links::LinkBuilder;

/// Creates, inspects, and deletes address pools.
#[derive(Clone)]
pub struct PoolManager {
    store: Arc<dyn Store>,
    links: LinkBuilder,
}

impl PoolManager {
    pub fn new(store: Arc<dyn Store>, links: LinkBuilder) -> Self {
        Self { store, links }
    }

    /// Create a pool and register its initial addresses.
    ///
    /// Name uniqueness is checked by enumerating existing pools, so two
    /// concurrent calls with the same name can race; the store rejects the
    /// loser inside its own write transaction.
    ///
    /// If adding addresses fails, the error is returned and the empty pool
    /// record is left in place for an operator to clean up.
    pub fn add_pool(&self, name: &str, subnet: Option<&str>, ips: &[String]) -> AllocResult<Pool> {
        if name.trim().is_empty() {
            return Err(AllocError::BadRequest("pool name must not be empty".to_string()));
        }
        if self.store.get_pools()?.iter().any(|p| p.name == name) {
            return Err(AllocError::DuplicatePoolName(name.to_string()));
        }

        let record = PoolRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.store.add_pool(&record)?;
        info!(pool_id = %record.id, %name, "pool created");

        if subnet.is_some() || !ips.is_empty() {
            if let Err(e) = self.add_address(&record.id, subnet, ips) {
                warn!(pool_id = %record.id, %name, error = %e, "pool created without its addresses");
                return Err(e);
            }
        }

        // Re-read so the caller sees committed counts.
        Ok(self.links.pool(self.store.get_pool(&record.id)?))
    }

    pub fn list_pools(&self) -> AllocResult<Vec<Pool>> {
        Ok(self
            .store
            .get_pools()?
            .into_iter()
            .map(|pool| self.links.pool(pool))
            .collect())
    }

    pub fn show_pool(&self, pool_id: &str) -> AllocResult<Pool> {
        Ok(self.links.pool(self.store.get_pool(pool_id)?))
    }

    /// Add a subnet, or failing that a list of individual addresses.
    pub fn add_address(
        &self,
        pool_id: &str,
        subnet: Option<&str>,
        ips: &[String],
    ) -> AllocResult<()> {
        match subnet {
            Some(cidr) => {
                self.store.add_external_subnet(pool_id, cidr)?;
            }
            None if !ips.is_empty() => {
                self.store.add_external_ips(pool_id, ips)?;
            }
            None => {
                return Err(AllocError::BadRequest(
                    "either a subnet or a list of addresses is required".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Remove a subnet or a single address. Exactly one selector is used.
    pub fn remove_address(
        &self,
        pool_id: &str,
        subnet_id: Option<&str>,
        ip_id: Option<&str>,
    ) -> AllocResult<()> {
        match (subnet_id, ip_id) {
            (Some(subnet_id), _) => self.store.delete_subnet(pool_id, subnet_id)?,
            (None, Some(ip_id)) => self.store.delete_external_ip(pool_id, ip_id)?,
            (None, None) => {
                return Err(AllocError::BadRequest(
                    "either a subnet or an address id is required".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn delete_pool(&self, pool_id: &str) -> AllocResult<()> {
        self.store.delete_pool(pool_id)?;
        Ok(())
    }
}
