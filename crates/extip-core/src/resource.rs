//! Resource descriptors exchanged with the quota service.

use serde::{Deserialize, Serialize};

/// Kind of capacity tracked by admission control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ExternalIp,
}

/// A request for `value` units of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub value: u32,
}

impl ResourceDescriptor {
    /// One external IP, the unit reserved per mapping attempt.
    pub fn external_ip() -> Self {
        Self {
            kind: ResourceKind::ExternalIp,
            value: 1,
        }
    }
}
