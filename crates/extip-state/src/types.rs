//! Domain types for the extip state store.
//!
//! The `*Record` types are what gets persisted. `Pool`, `ExternalSubnet`,
//! `ExternalIp`, and `MappedIp` are the views handed to callers; their
//! `links` are computed per request and never written to a table.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Unique identifier for a pool.
pub type PoolId = String;

/// Unique identifier for a compute instance.
pub type InstanceId = String;

/// Unique identifier for a tenant.
pub type TenantId = String;

// ── Links ─────────────────────────────────────────────────────────

/// A hyperlink relation attached to an externally visible record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

impl Link {
    pub fn new(rel: &str, href: String) -> Self {
        Self {
            rel: rel.to_string(),
            href,
        }
    }
}

// ── Pools ─────────────────────────────────────────────────────────

/// A named collection of external addresses, as seen by callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pool {
    pub id: PoolId,
    pub name: String,
    /// Addresses in the pool with no active mapping.
    pub free: usize,
    /// All addresses in the pool, mapped or not.
    pub total_ips: usize,
    pub subnets: Vec<ExternalSubnet>,
    /// Individually registered addresses. Subnet members are counted but not listed.
    pub ips: Vec<ExternalIp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// A CIDR block assigned to a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalSubnet {
    pub id: String,
    pub cidr: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// A single individually registered external address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalIp {
    pub id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// An active binding of one external address to one instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappedIp {
    /// Identifier of the external address record.
    pub id: String,
    pub external_ip: String,
    pub internal_ip: String,
    pub pool_id: PoolId,
    pub pool_name: String,
    pub instance_id: InstanceId,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

// ── Persisted records ─────────────────────────────────────────────

/// Persisted pool header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolRecord {
    pub id: PoolId,
    pub name: String,
}

/// Persisted subnet entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubnetRecord {
    pub id: String,
    pub pool_id: PoolId,
    pub cidr: String,
}

/// Persisted external address. `subnet_id` is set for subnet-expanded addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressRecord {
    pub id: String,
    pub pool_id: PoolId,
    pub address: String,
    pub subnet_id: Option<String>,
}

// ── Instances and tenants ─────────────────────────────────────────

/// Tenant IDs that collide with admin path segments under `/api/v1`.
pub const RESERVED_TENANT_IDS: &[&str] = &["pools", "external-ips"];

/// A running compute workload, written by the instance lifecycle subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub tenant_id: TenantId,
    pub internal_ip: String,
}

/// Where a tenant's network agent listens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentBinding {
    pub address: IpAddr,
    /// Falls back to the configured agent port when absent.
    pub port: Option<u16>,
}

/// A customer account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub id: TenantId,
    /// `None` until the tenant's network agent has been launched.
    pub agent: Option<AgentBinding>,
}

impl SubnetRecord {
    /// Build the composite key for the subnets table.
    pub fn table_key(&self) -> String {
        format!("{}:{}", self.pool_id, self.id)
    }
}

impl AddressRecord {
    /// The public view of an individually registered address.
    pub fn to_external_ip(&self) -> ExternalIp {
        ExternalIp {
            id: self.id.clone(),
            address: self.address.clone(),
            links: Vec::new(),
        }
    }
}

impl SubnetRecord {
    pub fn to_external_subnet(&self) -> ExternalSubnet {
        ExternalSubnet {
            id: self.id.clone(),
            cidr: self.cidr.clone(),
            links: Vec::new(),
        }
    }
}
