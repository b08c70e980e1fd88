//! QuotaActor — the task that owns all usage counters.
//!
//! Requests arrive on a bounded mpsc channel and are handled strictly in
//! order, which makes every consume/release pair atomic with respect to
//! other callers without any lock on the caller side. The actor stops when
//! every [`QuotaHandle`] has been dropped.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use extip_core::{QuotaSettings, ResourceDescriptor, ResourceKind};

use crate::error::{QuotaError, QuotaResult};
use crate::service::{QuotaDecision, QuotaService};

const CONTROL_CHANNEL_CAPACITY: usize = 256;

/// Capacity limits applied by the actor.
#[derive(Debug, Clone, Default)]
pub struct QuotaLimits {
    /// Limit for tenants without an override. `None` means unlimited.
    pub default_external_ips: Option<u32>,
    pub tenant_external_ips: HashMap<String, u32>,
}

impl QuotaLimits {
    pub fn from_settings(settings: &QuotaSettings) -> Self {
        Self {
            default_external_ips: settings.default_external_ips,
            tenant_external_ips: settings.tenants.clone(),
        }
    }

    /// Set a tenant-specific external IP limit.
    pub fn with_tenant_limit(mut self, tenant_id: &str, limit: u32) -> Self {
        self.tenant_external_ips.insert(tenant_id.to_string(), limit);
        self
    }

    fn limit_for(&self, tenant_id: &str, kind: ResourceKind) -> Option<u32> {
        match kind {
            ResourceKind::ExternalIp => self
                .tenant_external_ips
                .get(tenant_id)
                .copied()
                .or(self.default_external_ips),
        }
    }
}

enum QuotaRequest {
    Consume {
        tenant_id: String,
        resource: ResourceDescriptor,
        reply: oneshot::Sender<QuotaDecision>,
    },
    Release {
        tenant_id: String,
        resource: ResourceDescriptor,
        reply: oneshot::Sender<()>,
    },
    Usage {
        tenant_id: String,
        kind: ResourceKind,
        reply: oneshot::Sender<u32>,
    },
}

/// Owns the usage table and answers [`QuotaRequest`]s.
pub struct QuotaActor {
    control_rx: mpsc::Receiver<QuotaRequest>,
    limits: QuotaLimits,
    usage: HashMap<(String, ResourceKind), u32>,
}

impl QuotaActor {
    async fn run(mut self) {
        while let Some(request) = self.control_rx.recv().await {
            match request {
                QuotaRequest::Consume {
                    tenant_id,
                    resource,
                    reply,
                } => {
                    let decision = self.consume(tenant_id.clone(), resource);
                    // A requester that went away never learns it holds the unit.
                    if reply.send(decision).is_err() && decision.allowed() {
                        warn!(%tenant_id, kind = ?resource.kind, "consumer gone, returning unit");
                        self.release(tenant_id, resource);
                    }
                }
                QuotaRequest::Release {
                    tenant_id,
                    resource,
                    reply,
                } => {
                    self.release(tenant_id, resource);
                    let _ = reply.send(());
                }
                QuotaRequest::Usage {
                    tenant_id,
                    kind,
                    reply,
                } => {
                    let current = self.usage.get(&(tenant_id, kind)).copied().unwrap_or(0);
                    let _ = reply.send(current);
                }
            }
        }
        debug!("quota actor shutting down, all handles dropped");
    }

    fn consume(&mut self, tenant_id: String, resource: ResourceDescriptor) -> QuotaDecision {
        let limit = self.limits.limit_for(&tenant_id, resource.kind);
        let current = self
            .usage
            .entry((tenant_id.clone(), resource.kind))
            .or_insert(0);
        let wanted = current.saturating_add(resource.value);

        if limit.is_some_and(|limit| wanted > limit) {
            warn!(%tenant_id, kind = ?resource.kind, usage = *current, ?limit, "quota denied");
            return QuotaDecision::new(false, *current, limit);
        }

        *current = wanted;
        debug!(%tenant_id, kind = ?resource.kind, usage = wanted, "quota consumed");
        QuotaDecision::new(true, wanted, limit)
    }

    fn release(&mut self, tenant_id: String, resource: ResourceDescriptor) {
        let current = self
            .usage
            .entry((tenant_id.clone(), resource.kind))
            .or_insert(0);
        if *current < resource.value {
            warn!(%tenant_id, kind = ?resource.kind, usage = *current, "release exceeds usage");
        }
        *current = current.saturating_sub(resource.value);
        debug!(%tenant_id, kind = ?resource.kind, usage = *current, "quota released");
    }
}

/// Cloneable front end of a running [`QuotaActor`].
#[derive(Clone)]
pub struct QuotaHandle {
    control_tx: mpsc::Sender<QuotaRequest>,
}

impl QuotaHandle {
    /// Start a quota actor on the current tokio runtime.
    pub fn spawn(limits: QuotaLimits) -> Self {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let actor = QuotaActor {
            control_rx,
            limits,
            usage: HashMap::new(),
        };
        tokio::spawn(actor.run());
        Self { control_tx }
    }

    /// Current usage of a resource kind for a tenant.
    pub async fn usage(&self, tenant_id: &str, kind: ResourceKind) -> QuotaResult<u32> {
        let (reply, rx) = oneshot::channel();
        self.request(QuotaRequest::Usage {
            tenant_id: tenant_id.to_string(),
            kind,
            reply,
        })
        .await?;
        rx.await.map_err(|_| QuotaError::Unavailable)
    }

    async fn request(&self, request: QuotaRequest) -> QuotaResult<()> {
        self.control_tx
            .send(request)
            .await
            .map_err(|_| QuotaError::Unavailable)
    }
}

#[async_trait]
impl QuotaService for QuotaHandle {
    async fn consume(
        &self,
        tenant_id: &str,
        resource: ResourceDescriptor,
    ) -> QuotaResult<QuotaDecision> {
        let (reply, rx) = oneshot::channel();
        self.request(QuotaRequest::Consume {
            tenant_id: tenant_id.to_string(),
            resource,
            reply,
        })
        .await?;
        rx.await.map_err(|_| QuotaError::Unavailable)
    }

    async fn release(&self, tenant_id: &str, resource: ResourceDescriptor) -> QuotaResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(QuotaRequest::Release {
            tenant_id: tenant_id.to_string(),
            resource,
            reply,
        })
        .await?;
        rx.await.map_err(|_| QuotaError::Unavailable)
    }
}
