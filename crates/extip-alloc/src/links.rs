//! Hyperlinks for externally visible records.
//!
//! Links are computed per request from the configured API base address and
//! never persisted. Decoration takes records by value and returns new ones,
//! so nothing shared is mutated in place.

use extip_state::{Link, MappedIp, Pool};

/// Who is asking: an administrator sees everything, a tenant only its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Admin,
    Tenant(String),
}

impl Scope {
    /// An empty tenant ID means administrator scope.
    pub fn from_tenant(tenant_id: &str) -> Self {
        if tenant_id.is_empty() {
            Scope::Admin
        } else {
            Scope::Tenant(tenant_id.to_string())
        }
    }

    pub fn tenant(&self) -> Option<&str> {
        match self {
            Scope::Admin => None,
            Scope::Tenant(id) => Some(id),
        }
    }
}

/// Builds `self` and related-resource links from an API base address.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    api_url: String,
}

impl LinkBuilder {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn pool_href(&self, pool_id: &str) -> String {
        format!("{}/pools/{pool_id}", self.api_url)
    }

    /// Attach links to a pool, its subnets, and its individual addresses.
    pub fn pool(&self, mut pool: Pool) -> Pool {
        let base = self.pool_href(&pool.id);

        for subnet in &mut pool.subnets {
            subnet.links = vec![Link::new("self", format!("{base}/subnets/{}", subnet.id))];
        }
        for ip in &mut pool.ips {
            ip.links = vec![Link::new("self", format!("{base}/external-ips/{}", ip.id))];
        }
        pool.links = vec![Link::new("self", base)];
        pool
    }

    /// Attach links to a mapping. Administrators also get a `pool` link.
    pub fn mapped_ip(&self, mut mapping: MappedIp, scope: &Scope) -> MappedIp {
        mapping.links = match scope {
            Scope::Tenant(tenant) => vec![Link::new(
                "self",
                format!("{}/{tenant}/external-ips/{}", self.api_url, mapping.id),
            )],
            Scope::Admin => vec![
                Link::new(
                    "self",
                    format!("{}/external-ips/{}", self.api_url, mapping.id),
                ),
                Link::new("pool", self.pool_href(&mapping.pool_id)),
            ],
        };
        mapping
    }
}
