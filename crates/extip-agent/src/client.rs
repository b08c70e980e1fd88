//! Agent client trait and its HTTP implementation.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use tracing::{debug, info};

use extip_state::{MappedIp, Tenant};

use crate::error::{AgentError, AgentResult};

/// Installs and removes external address translations on a tenant's agent.
#[async_trait]
pub trait RemoteAgentClient: Send + Sync {
    async fn map_external_ip(&self, tenant: &Tenant, mapping: &MappedIp) -> AgentResult<()>;

    async fn unmap_external_ip(&self, tenant: &Tenant, mapping: &MappedIp) -> AgentResult<()>;
}

/// HTTP/1 client for tenant agents.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    /// Used when the tenant's agent binding carries no port.
    default_port: u16,
    timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(default_port: u16, timeout: Duration) -> Self {
        Self {
            default_port,
            timeout,
        }
    }

    fn agent_addr(&self, tenant: &Tenant) -> AgentResult<SocketAddr> {
        let binding = tenant
            .agent
            .ok_or_else(|| AgentError::NoAgent(tenant.id.clone()))?;
        Ok(SocketAddr::new(
            binding.address,
            binding.port.unwrap_or(self.default_port),
        ))
    }

    async fn send(
        &self,
        tenant: &Tenant,
        method: http::Method,
        path: String,
        mapping: &MappedIp,
    ) -> AgentResult<()> {
        let addr = self.agent_addr(tenant)?;
        let agent = addr.to_string();
        let uri = format!("http://{agent}{path}");
        let body = serde_json::to_vec(mapping).map_err(|e| AgentError::Request(e.to_string()))?;

        let req = http::Request::builder()
            .method(method)
            .uri(&uri)
            .header("host", agent.as_str())
            .header("content-type", "application/json")
            .header("user-agent", "extip-agent/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| AgentError::Request(e.to_string()))?;

        let unreachable = |reason: String| AgentError::Unreachable {
            agent: agent.clone(),
            reason,
        };

        let status = tokio::time::timeout(self.timeout, async {
            let stream = tokio::net::TcpStream::connect(addr)
                .await
                .map_err(|e| unreachable(e.to_string()))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| unreachable(e.to_string()))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| unreachable(e.to_string()))?;
            Ok::<_, AgentError>(resp.status())
        })
        .await
        .map_err(|_| unreachable("timed out".to_string()))??;

        if !status.is_success() {
            debug!(%status, %uri, "agent returned non-2xx");
            return Err(AgentError::Rejected {
                agent,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteAgentClient for HttpAgentClient {
    async fn map_external_ip(&self, tenant: &Tenant, mapping: &MappedIp) -> AgentResult<()> {
        self.send(tenant, http::Method::POST, "/external-ips".to_string(), mapping)
            .await?;
        info!(
            tenant = %tenant.id,
            address = %mapping.external_ip,
            internal = %mapping.internal_ip,
            "agent mapped external address"
        );
        Ok(())
    }

    async fn unmap_external_ip(&self, tenant: &Tenant, mapping: &MappedIp) -> AgentResult<()> {
        let path = format!("/external-ips/{}", mapping.external_ip);
        self.send(tenant, http::Method::DELETE, path, mapping).await?;
        info!(
            tenant = %tenant.id,
            address = %mapping.external_ip,
            "agent unmapped external address"
        );
        Ok(())
    }
}
