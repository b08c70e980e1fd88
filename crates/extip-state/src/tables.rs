//! redb table definitions for the extip state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Pool records keyed by `{pool_id}`.
pub const POOLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pools");

/// Subnet records keyed by `{pool_id}:{subnet_id}`.
pub const SUBNETS: TableDefinition<&str, &[u8]> = TableDefinition::new("subnets");

/// External address records keyed by the address text.
pub const EXTERNAL_IPS: TableDefinition<&str, &[u8]> = TableDefinition::new("external_ips");

/// Active mappings keyed by the external address text.
pub const MAPPINGS: TableDefinition<&str, &[u8]> = TableDefinition::new("mappings");

/// Instance records keyed by `{instance_id}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Tenant records keyed by `{tenant_id}`.
pub const TENANTS: TableDefinition<&str, &[u8]> = TableDefinition::new("tenants");
