//! API regression tests.
//!
//! Drives the full router with `oneshot` requests. The controller talks to
//! a real HTTP agent served from a local socket, so agent failures travel
//! the same path they would in production.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, post};
use serde_json::{Value, json};
use tower::ServiceExt;

use extip_agent::HttpAgentClient;
use extip_alloc::{AddressAllocator, LinkBuilder, PoolManager};
use extip_api::{ApiState, build_router};
use extip_core::ResourceKind;
use extip_quota::{QuotaHandle, QuotaLimits};
use extip_state::{AgentBinding, Instance, StateStore, Tenant};

#[derive(Default)]
struct FakeAgent {
    reject: AtomicBool,
    maps: AtomicUsize,
    unmaps: AtomicUsize,
}

async fn agent_map(State(agent): State<Arc<FakeAgent>>) -> StatusCode {
    agent.maps.fetch_add(1, Ordering::SeqCst);
    if agent.reject.load(Ordering::SeqCst) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn agent_unmap(State(agent): State<Arc<FakeAgent>>) -> StatusCode {
    agent.unmaps.fetch_add(1, Ordering::SeqCst);
    StatusCode::OK
}

/// Serve a fake tenant agent and return it with its port.
async fn spawn_agent() -> (Arc<FakeAgent>, u16) {
    let agent = Arc::new(FakeAgent::default());
    let router = Router::new()
        .route("/external-ips", post(agent_map))
        .route("/external-ips/{address}", delete(agent_unmap))
        .with_state(agent.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (agent, port)
}

struct Harness {
    router: Router,
    store: StateStore,
    quota: QuotaHandle,
    agent: Arc<FakeAgent>,
}

impl Harness {
    async fn new(limits: QuotaLimits) -> Self {
        let (agent, port) = spawn_agent().await;
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_tenant(&Tenant {
                id: "t1".to_string(),
                agent: Some(AgentBinding {
                    address: "127.0.0.1".parse().unwrap(),
                    port: Some(port),
                }),
            })
            .unwrap();
        store
            .put_instance(&Instance {
                id: "instance-1".to_string(),
                tenant_id: "t1".to_string(),
                internal_ip: "172.16.0.2".to_string(),
            })
            .unwrap();

        let quota = QuotaHandle::spawn(limits);
        let links = LinkBuilder::new("https://ctl:8889/api/v1");
        let state = ApiState {
            pools: PoolManager::new(Arc::new(store.clone()), links.clone()),
            allocator: AddressAllocator::new(
                Arc::new(store.clone()),
                Arc::new(store.clone()),
                Arc::new(quota.clone()),
                Arc::new(HttpAgentClient::new(9999, Duration::from_secs(2))),
                links,
            ),
        };

        Self {
            router: build_router(state),
            store,
            quota,
            agent,
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn pool_free(&self, pool_id: &str) -> u64 {
        let (status, body) = self.send("GET", &format!("/api/v1/pools/{pool_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["free"].as_u64().unwrap()
    }

    async fn usage(&self) -> u32 {
        self.quota.usage("t1", ResourceKind::ExternalIp).await.unwrap()
    }
}

#[tokio::test]
async fn create_pool_from_subnet() {
    let h = Harness::new(QuotaLimits::default()).await;

    let (status, body) = h
        .send(
            "POST",
            "/api/v1/pools",
            Some(json!({"name": "pool-a", "subnet": "10.0.0.0/30"})),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["free"], 2);
    assert_eq!(body["data"]["total_ips"], 2);
    let pool_id = body["data"]["id"].as_str().unwrap();
    assert_eq!(
        body["data"]["links"][0]["href"],
        format!("https://ctl:8889/api/v1/pools/{pool_id}")
    );
}

#[tokio::test]
async fn duplicate_pool_name_rejected() {
    let h = Harness::new(QuotaLimits::default()).await;
    let (status, _) = h.send("POST", "/api/v1/pools", Some(json!({"name": "pool-a"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = h.send("POST", "/api/v1/pools", Some(json!({"name": "pool-a"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("pool-a"));
}

#[tokio::test]
async fn quota_denial_leaves_no_mapping() {
    let h = Harness::new(QuotaLimits::default().with_tenant_limit("t1", 0)).await;
    h.send(
        "POST",
        "/api/v1/pools",
        Some(json!({"name": "pool-a", "ips": ["203.0.113.5"]})),
    )
    .await;

    let (status, _) = h
        .send("POST", "/api/v1/external-ips", Some(json!({"instance_id": "instance-1"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.send("GET", "/api/v1/external-ips", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
    assert_eq!(h.agent.maps.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn map_programs_agent_once() {
    let h = Harness::new(QuotaLimits::default()).await;
    let (_, body) = h
        .send(
            "POST",
            "/api/v1/pools",
            Some(json!({"name": "pool-a", "ips": ["203.0.113.5"]})),
        )
        .await;
    let pool_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .send("POST", "/api/v1/external-ips", Some(json!({"instance_id": "instance-1"})))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["external_ip"], "203.0.113.5");
    assert_eq!(body["data"]["internal_ip"], "172.16.0.2");
    assert_eq!(body["data"]["tenant_id"], "t1");
    assert_eq!(h.pool_free(&pool_id).await, 0);
    assert_eq!(h.agent.maps.load(Ordering::SeqCst), 1);
    assert_eq!(h.usage().await, 1);
}

#[tokio::test]
async fn agent_failure_restores_pool_and_quota() {
    let h = Harness::new(QuotaLimits::default()).await;
    h.agent.reject.store(true, Ordering::SeqCst);
    let (_, body) = h
        .send(
            "POST",
            "/api/v1/pools",
            Some(json!({"name": "pool-a", "ips": ["203.0.113.5"]})),
        )
        .await;
    let pool_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .send("POST", "/api/v1/external-ips", Some(json!({"instance_id": "instance-1"})))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(h.pool_free(&pool_id).await, 1);
    assert_eq!(h.usage().await, 0);
    assert!(h.store.get_mapped_ips(None).unwrap().is_empty());
    assert_eq!(h.agent.unmaps.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn add_address_without_selector_is_bad_request() {
    let h = Harness::new(QuotaLimits::default()).await;
    let (_, body) = h.send("POST", "/api/v1/pools", Some(json!({"name": "pool-a"}))).await;
    let pool_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = h
        .send("POST", &format!("/api/v1/pools/{pool_id}"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenant_without_agent_is_not_found() {
    let h = Harness::new(QuotaLimits::default()).await;
    h.store
        .put_tenant(&Tenant {
            id: "t3".to_string(),
            agent: None,
        })
        .unwrap();
    h.store
        .put_instance(&Instance {
            id: "instance-3".to_string(),
            tenant_id: "t3".to_string(),
            internal_ip: "172.16.0.3".to_string(),
        })
        .unwrap();
    let (_, body) = h
        .send(
            "POST",
            "/api/v1/pools",
            Some(json!({"name": "pool-a", "ips": ["203.0.113.5"]})),
        )
        .await;
    let pool_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .send("POST", "/api/v1/t3/external-ips", Some(json!({"instance_id": "instance-3"})))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(h.pool_free(&pool_id).await, 1);
    assert_eq!(h.agent.maps.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.quota.usage("t3", ResourceKind::ExternalIp).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn tenant_release_returns_address_and_quota() {
    let h = Harness::new(QuotaLimits::default().with_tenant_limit("t1", 1)).await;
    let (_, body) = h
        .send(
            "POST",
            "/api/v1/pools",
            Some(json!({"name": "pool-a", "ips": ["203.0.113.5"]})),
        )
        .await;
    let pool_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = h
        .send(
            "POST",
            "/api/v1/t1/external-ips",
            Some(json!({"instance_id": "instance-1", "pool_name": "pool-a"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let self_link = body["data"]["links"][0]["href"].as_str().unwrap().to_string();
    assert!(self_link.starts_with("https://ctl:8889/api/v1/t1/external-ips/"));

    let (status, _) = h.send("GET", "/api/v1/t2/external-ips/203.0.113.5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.send("DELETE", "/api/v1/t1/external-ips/203.0.113.5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.agent.unmaps.load(Ordering::SeqCst), 1);
    assert_eq!(h.pool_free(&pool_id).await, 1);
    assert_eq!(h.usage().await, 0);

    let (status, _) = h.send("DELETE", &format!("/api/v1/pools/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn pool_with_mapping_cannot_be_deleted() {
    let h = Harness::new(QuotaLimits::default()).await;
    let (_, body) = h
        .send(
            "POST",
            "/api/v1/pools",
            Some(json!({"name": "pool-a", "ips": ["203.0.113.5"]})),
        )
        .await;
    let pool_id = body["data"]["id"].as_str().unwrap().to_string();
    h.send("POST", "/api/v1/external-ips", Some(json!({"instance_id": "instance-1"})))
        .await;

    let (status, _) = h.send("DELETE", &format!("/api/v1/pools/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
