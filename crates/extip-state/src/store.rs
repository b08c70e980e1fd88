//! StateStore — redb-backed persistence for the external-address controller.
//!
//! Provides typed operations over pools, subnets, external addresses,
//! mappings, instances, and tenants. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use ipnet::IpNet;
use redb::{Database, ReadableDatabase, ReadableTable, Table, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Largest number of host bits a single subnet may expand to.
const MAX_SUBNET_HOST_BITS: u8 = 16;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

/// Read and decode a single value.
fn lookup<T, R>(table: &R, key: &str) -> StateResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

/// Decode every value of a table, in key order.
fn scan<T, R>(table: &R) -> StateResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    let mut results = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (_, value) = entry.map_err(map_err!(Read))?;
        results.push(decode(value.value())?);
    }
    Ok(results)
}

fn parse_address(raw: &str) -> StateResult<IpAddr> {
    raw.trim()
        .parse()
        .map_err(|_| StateError::InvalidAddress(raw.to_string()))
}

/// Mapping-table key for a caller-supplied address.
///
/// Addresses are stored in `IpAddr` display form, so other spellings of the
/// same address are normalized. Anything unparseable is used as given.
fn address_key(raw: &str) -> String {
    raw.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Expand a CIDR into its usable host addresses.
///
/// IPv4 prefixes shorter than /31 exclude the network and broadcast addresses.
fn expand_subnet(cidr: &str) -> StateResult<Vec<IpAddr>> {
    let net: IpNet = cidr
        .trim()
        .parse()
        .map_err(|_| StateError::InvalidAddress(cidr.to_string()))?;
    let host_bits = net.max_prefix_len() - net.prefix_len();
    if host_bits > MAX_SUBNET_HOST_BITS {
        return Err(StateError::InvalidAddress(format!(
            "{cidr}: subnet larger than /{}",
            net.max_prefix_len() - MAX_SUBNET_HOST_BITS
        )));
    }
    Ok(net.hosts().collect())
}

/// Build the caller-facing view of a pool from its persisted parts.
fn assemble_pool(
    record: PoolRecord,
    subnets: &[SubnetRecord],
    addresses: &[AddressRecord],
    mapped: &HashSet<String>,
) -> Pool {
    let members: Vec<&AddressRecord> = addresses
        .iter()
        .filter(|a| a.pool_id == record.id)
        .collect();
    let free = members.iter().filter(|a| !mapped.contains(&a.address)).count();

    Pool {
        subnets: subnets
            .iter()
            .filter(|s| s.pool_id == record.id)
            .map(SubnetRecord::to_external_subnet)
            .collect(),
        ips: members
            .iter()
            .filter(|a| a.subnet_id.is_none())
            .map(|a| a.to_external_ip())
            .collect(),
        free,
        total_ips: members.len(),
        id: record.id,
        name: record.name,
        links: Vec::new(),
    }
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(POOLS).map_err(map_err!(Table))?;
        txn.open_table(SUBNETS).map_err(map_err!(Table))?;
        txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?;
        txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
        txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(TENANTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Pools ──────────────────────────────────────────────────────

    /// Insert a new, empty pool.
    ///
    /// Fails with `DuplicateName` if a pool with the same name exists.
    pub fn add_pool(&self, pool: &PoolRecord) -> StateResult<()> {
        let value = encode(pool)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(POOLS).map_err(map_err!(Table))?;
            let existing: Vec<PoolRecord> = scan(&table)?;
            if existing.iter().any(|p| p.name == pool.name) {
                return Err(StateError::DuplicateName(pool.name.clone()));
            }
            table
                .insert(pool.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pool_id = %pool.id, name = %pool.name, "pool stored");
        Ok(())
    }

    /// List all pools with their subnets, addresses, and free counts.
    pub fn list_pools(&self) -> StateResult<Vec<Pool>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let records: Vec<PoolRecord> =
            scan(&txn.open_table(POOLS).map_err(map_err!(Table))?)?;
        let subnets: Vec<SubnetRecord> =
            scan(&txn.open_table(SUBNETS).map_err(map_err!(Table))?)?;
        let addresses: Vec<AddressRecord> =
            scan(&txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?)?;
        let mapped = Self::mapped_addresses(&txn.open_table(MAPPINGS).map_err(map_err!(Table))?)?;

        Ok(records
            .into_iter()
            .map(|r| assemble_pool(r, &subnets, &addresses, &mapped))
            .collect())
    }

    /// Get a pool by ID.
    pub fn get_pool(&self, pool_id: &str) -> StateResult<Pool> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let record: PoolRecord = lookup(&txn.open_table(POOLS).map_err(map_err!(Table))?, pool_id)?
            .ok_or_else(|| StateError::NotFound(format!("pool {pool_id}")))?;
        let subnets: Vec<SubnetRecord> =
            scan(&txn.open_table(SUBNETS).map_err(map_err!(Table))?)?;
        let addresses: Vec<AddressRecord> =
            scan(&txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?)?;
        let mapped = Self::mapped_addresses(&txn.open_table(MAPPINGS).map_err(map_err!(Table))?)?;
        Ok(assemble_pool(record, &subnets, &addresses, &mapped))
    }

    /// Delete a pool with all of its subnets and addresses.
    ///
    /// Fails with `InUse` while any address of the pool is mapped.
    pub fn delete_pool(&self, pool_id: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut pools = txn.open_table(POOLS).map_err(map_err!(Table))?;
            if lookup::<PoolRecord, _>(&pools, pool_id)?.is_none() {
                return Err(StateError::NotFound(format!("pool {pool_id}")));
            }

            let mappings: Vec<MappedIp> =
                scan(&txn.open_table(MAPPINGS).map_err(map_err!(Table))?)?;
            if mappings.iter().any(|m| m.pool_id == pool_id) {
                return Err(StateError::InUse(format!("pool {pool_id}")));
            }

            let mut addresses = txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?;
            let doomed: Vec<AddressRecord> = scan(&addresses)?;
            for record in doomed.iter().filter(|a| a.pool_id == pool_id) {
                addresses
                    .remove(record.address.as_str())
                    .map_err(map_err!(Write))?;
            }

            let mut subnets = txn.open_table(SUBNETS).map_err(map_err!(Table))?;
            let doomed: Vec<SubnetRecord> = scan(&subnets)?;
            for record in doomed.iter().filter(|s| s.pool_id == pool_id) {
                subnets
                    .remove(record.table_key().as_str())
                    .map_err(map_err!(Write))?;
            }

            pools.remove(pool_id).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%pool_id, "pool deleted");
        Ok(())
    }

    // ── Subnets and addresses ──────────────────────────────────────

    /// Register every usable address of `cidr` in a pool.
    pub fn add_external_subnet(&self, pool_id: &str, cidr: &str) -> StateResult<ExternalSubnet> {
        let hosts = expand_subnet(cidr)?;
        let subnet = SubnetRecord {
            id: Uuid::new_v4().to_string(),
            pool_id: pool_id.to_string(),
            cidr: cidr.trim().to_string(),
        };
        let records: Vec<AddressRecord> = hosts
            .iter()
            .map(|ip| AddressRecord {
                id: Uuid::new_v4().to_string(),
                pool_id: pool_id.to_string(),
                address: ip.to_string(),
                subnet_id: Some(subnet.id.clone()),
            })
            .collect();

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            Self::require_pool(&txn.open_table(POOLS).map_err(map_err!(Table))?, pool_id)?;
            Self::insert_addresses(
                &mut txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?,
                &records,
            )?;
            let mut subnets = txn.open_table(SUBNETS).map_err(map_err!(Table))?;
            subnets
                .insert(subnet.table_key().as_str(), encode(&subnet)?.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%pool_id, cidr = %subnet.cidr, count = records.len(), "subnet added");
        Ok(subnet.to_external_subnet())
    }

    /// Register individual addresses in a pool.
    pub fn add_external_ips(&self, pool_id: &str, ips: &[String]) -> StateResult<Vec<ExternalIp>> {
        let mut records = Vec::with_capacity(ips.len());
        for raw in ips {
            let ip = parse_address(raw)?;
            records.push(AddressRecord {
                id: Uuid::new_v4().to_string(),
                pool_id: pool_id.to_string(),
                address: ip.to_string(),
                subnet_id: None,
            });
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            Self::require_pool(&txn.open_table(POOLS).map_err(map_err!(Table))?, pool_id)?;
            Self::insert_addresses(
                &mut txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?,
                &records,
            )?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%pool_id, count = records.len(), "external addresses added");
        Ok(records.iter().map(AddressRecord::to_external_ip).collect())
    }

    /// Remove a subnet and all addresses expanded from it.
    pub fn delete_subnet(&self, pool_id: &str, subnet_id: &str) -> StateResult<()> {
        let key = format!("{pool_id}:{subnet_id}");
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut subnets = txn.open_table(SUBNETS).map_err(map_err!(Table))?;
            if lookup::<SubnetRecord, _>(&subnets, &key)?.is_none() {
                return Err(StateError::NotFound(format!("subnet {subnet_id}")));
            }

            let mapped =
                Self::mapped_addresses(&txn.open_table(MAPPINGS).map_err(map_err!(Table))?)?;
            let mut addresses = txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?;
            let all: Vec<AddressRecord> = scan(&addresses)?;
            let members: Vec<&AddressRecord> = all
                .iter()
                .filter(|a| a.subnet_id.as_deref() == Some(subnet_id))
                .collect();
            if members.iter().any(|a| mapped.contains(&a.address)) {
                return Err(StateError::InUse(format!("subnet {subnet_id}")));
            }
            for record in members {
                addresses
                    .remove(record.address.as_str())
                    .map_err(map_err!(Write))?;
            }
            subnets.remove(key.as_str()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%pool_id, %subnet_id, "subnet deleted");
        Ok(())
    }

    /// Remove a single individually registered address.
    pub fn delete_external_ip(&self, pool_id: &str, ip_id: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut addresses = txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?;
            let all: Vec<AddressRecord> = scan(&addresses)?;
            let record = all
                .into_iter()
                .find(|a| a.id == ip_id && a.pool_id == pool_id && a.subnet_id.is_none())
                .ok_or_else(|| StateError::NotFound(format!("external ip {ip_id}")))?;

            let mappings = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
            if lookup::<MappedIp, _>(&mappings, &record.address)?.is_some() {
                return Err(StateError::InUse(record.address));
            }
            addresses
                .remove(record.address.as_str())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(%pool_id, %ip_id, "external address deleted");
        Ok(())
    }

    // ── Mappings ───────────────────────────────────────────────────

    /// Atomically claim one free address from a pool for an instance.
    ///
    /// Fails with `PoolEmpty` when every address of the pool is mapped.
    pub fn map_external_ip(&self, pool_id: &str, instance_id: &str) -> StateResult<MappedIp> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mapping;
        {
            let pool =
                Self::require_pool(&txn.open_table(POOLS).map_err(map_err!(Table))?, pool_id)?;
            let instance: Instance =
                lookup(&txn.open_table(INSTANCES).map_err(map_err!(Table))?, instance_id)?
                    .ok_or_else(|| StateError::NotFound(format!("instance {instance_id}")))?;

            let mut mappings = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
            let mapped = Self::mapped_addresses(&mappings)?;
            let addresses: Vec<AddressRecord> =
                scan(&txn.open_table(EXTERNAL_IPS).map_err(map_err!(Table))?)?;
            let candidate = addresses
                .into_iter()
                .find(|a| a.pool_id == pool_id && !mapped.contains(&a.address))
                .ok_or_else(|| StateError::PoolEmpty(pool.name.clone()))?;

            mapping = MappedIp {
                id: candidate.id,
                external_ip: candidate.address,
                internal_ip: instance.internal_ip,
                pool_id: pool.id,
                pool_name: pool.name,
                instance_id: instance.id,
                tenant_id: instance.tenant_id,
                links: Vec::new(),
            };
            mappings
                .insert(mapping.external_ip.as_str(), encode(&mapping)?.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(address = %mapping.external_ip, %instance_id, "external address claimed");
        Ok(mapping)
    }

    /// Delete a mapping, returning the address to its pool.
    pub fn unmap_external_ip(&self, address: &str) -> StateResult<MappedIp> {
        let key = address_key(address);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mapping: MappedIp;
        {
            let mut mappings = txn.open_table(MAPPINGS).map_err(map_err!(Table))?;
            mapping = match mappings.remove(key.as_str()).map_err(map_err!(Write))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(format!("mapping {address}"))),
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%address, "external address released");
        Ok(mapping)
    }

    /// List mappings, optionally restricted to one tenant.
    pub fn get_mapped_ips(&self, tenant_id: Option<&str>) -> StateResult<Vec<MappedIp>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let all: Vec<MappedIp> = scan(&txn.open_table(MAPPINGS).map_err(map_err!(Table))?)?;
        Ok(match tenant_id {
            Some(tenant) => all.into_iter().filter(|m| m.tenant_id == tenant).collect(),
            None => all,
        })
    }

    /// Get the mapping for an external address.
    pub fn get_mapped_ip(&self, address: &str) -> StateResult<MappedIp> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        lookup(&txn.open_table(MAPPINGS).map_err(map_err!(Table))?, &address_key(address))?
            .ok_or_else(|| StateError::NotFound(format!("mapping {address}")))
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Insert or update an instance record.
    pub fn put_instance(&self, instance: &Instance) -> StateResult<()> {
        self.put(INSTANCES, &instance.id, instance)
    }

    /// Get an instance by ID.
    pub fn get_instance(&self, instance_id: &str) -> StateResult<Instance> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        lookup(&txn.open_table(INSTANCES).map_err(map_err!(Table))?, instance_id)?
            .ok_or_else(|| StateError::NotFound(format!("instance {instance_id}")))
    }

    /// Get an instance by ID, only if it belongs to `tenant_id`.
    pub fn get_tenant_instance(&self, tenant_id: &str, instance_id: &str) -> StateResult<Instance> {
        let instance = self.get_instance(instance_id)?;
        if instance.tenant_id != tenant_id {
            return Err(StateError::NotFound(format!(
                "instance {instance_id} for tenant {tenant_id}"
            )));
        }
        Ok(instance)
    }

    // ── Tenants ────────────────────────────────────────────────────

    /// Insert or update a tenant record.
    ///
    /// IDs in [`RESERVED_TENANT_IDS`] are rejected; their tenant routes would
    /// be shadowed by admin routes.
    pub fn put_tenant(&self, tenant: &Tenant) -> StateResult<()> {
        if RESERVED_TENANT_IDS.contains(&tenant.id.as_str()) {
            return Err(StateError::Reserved(tenant.id.clone()));
        }
        self.put(TENANTS, &tenant.id, tenant)
    }

    /// Get a tenant by ID.
    pub fn get_tenant(&self, tenant_id: &str) -> StateResult<Tenant> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        lookup(&txn.open_table(TENANTS).map_err(map_err!(Table))?, tenant_id)?
            .ok_or_else(|| StateError::NotFound(format!("tenant {tenant_id}")))
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn put<T: Serialize>(
        &self,
        definition: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        value: &T,
    ) -> StateResult<()> {
        let value = encode(value)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(definition).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "record stored");
        Ok(())
    }

    fn require_pool<R>(pools: &R, pool_id: &str) -> StateResult<PoolRecord>
    where
        R: ReadableTable<&'static str, &'static [u8]>,
    {
        lookup(pools, pool_id)?.ok_or_else(|| StateError::NotFound(format!("pool {pool_id}")))
    }

    fn mapped_addresses<R>(mappings: &R) -> StateResult<HashSet<String>>
    where
        R: ReadableTable<&'static str, &'static [u8]>,
    {
        let mut mapped = HashSet::new();
        for entry in mappings.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            mapped.insert(key.value().to_string());
        }
        Ok(mapped)
    }

    /// Insert address records, rejecting any address already registered.
    fn insert_addresses(
        table: &mut Table<'_, &'static str, &'static [u8]>,
        records: &[AddressRecord],
    ) -> StateResult<()> {
        let mut seen = HashSet::new();
        for record in records {
            let taken = table
                .get(record.address.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if taken || !seen.insert(record.address.as_str()) {
                return Err(StateError::AddressInUse(record.address.clone()));
            }
        }
        for record in records {
            table
                .insert(record.address.as_str(), encode(record)?.as_slice())
                .map_err(map_err!(Write))?;
        }
        Ok(())
    }
}
