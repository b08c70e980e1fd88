//! REST API handlers for external address mappings.
//!
//! Admin and tenant routes share one implementation per operation; the
//! tenant variants only narrow the [`Scope`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use extip_alloc::Scope;

use crate::ApiState;
use crate::handlers::{ApiResponse, alloc_error};

/// Map request body.
#[derive(Debug, serde::Deserialize)]
pub struct MapRequest {
    #[serde(default)]
    pub pool_name: Option<String>,
    pub instance_id: String,
}

async fn list(state: ApiState, scope: Scope) -> Response {
    match state.allocator.list_mapped_addresses(&scope) {
        Ok(mappings) => ApiResponse::ok(mappings).into_response(),
        Err(e) => alloc_error(e),
    }
}

async fn map(state: ApiState, scope: Scope, req: MapRequest) -> Response {
    match state
        .allocator
        .map_address(&scope, req.pool_name.as_deref(), &req.instance_id)
        .await
    {
        Ok(mapping) => (StatusCode::CREATED, ApiResponse::ok(mapping)).into_response(),
        Err(e) => alloc_error(e),
    }
}

async fn show(state: ApiState, scope: Scope, key: String) -> Response {
    match state.allocator.show_mapped_address(&scope, &key) {
        Ok(mapping) => ApiResponse::ok(mapping).into_response(),
        Err(e) => alloc_error(e),
    }
}

async fn release(state: ApiState, scope: Scope, key: String) -> Response {
    match state.allocator.release_address(&scope, &key).await {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => alloc_error(e),
    }
}

// ── Admin ──────────────────────────────────────────────────────

/// GET /api/v1/external-ips
pub async fn list_mapped_ips(State(state): State<ApiState>) -> Response {
    list(state, Scope::Admin).await
}

/// POST /api/v1/external-ips
pub async fn map_external_ip(
    State(state): State<ApiState>,
    Json(req): Json<MapRequest>,
) -> Response {
    map(state, Scope::Admin, req).await
}

/// GET /api/v1/external-ips/:address
pub async fn get_mapped_ip(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Response {
    show(state, Scope::Admin, address).await
}

/// DELETE /api/v1/external-ips/:address
pub async fn release_mapped_ip(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Response {
    release(state, Scope::Admin, address).await
}

// ── Tenant ─────────────────────────────────────────────────────

/// GET /api/v1/:tenant/external-ips
pub async fn list_tenant_mapped_ips(
    State(state): State<ApiState>,
    Path(tenant): Path<String>,
) -> Response {
    list(state, Scope::from_tenant(&tenant)).await
}

/// POST /api/v1/:tenant/external-ips
pub async fn map_tenant_external_ip(
    State(state): State<ApiState>,
    Path(tenant): Path<String>,
    Json(req): Json<MapRequest>,
) -> Response {
    map(state, Scope::from_tenant(&tenant), req).await
}

/// GET /api/v1/:tenant/external-ips/:address
pub async fn get_tenant_mapped_ip(
    State(state): State<ApiState>,
    Path((tenant, address)): Path<(String, String)>,
) -> Response {
    show(state, Scope::from_tenant(&tenant), address).await
}

/// DELETE /api/v1/:tenant/external-ips/:address
pub async fn release_tenant_mapped_ip(
    State(state): State<ApiState>,
    Path((tenant, address)): Path<(String, String)>,
) -> Response {
    release(state, Scope::from_tenant(&tenant), address).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use extip_quota::QuotaLimits;
    use extip_state::{AgentBinding, Instance, StateStore, Tenant};

    use crate::handlers::tests::test_state_with;

    fn seed(store: &StateStore) {
        for (tenant, instance) in [("t1", "inst-1"), ("t2", "inst-2")] {
            store
                .put_tenant(&Tenant {
                    id: tenant.to_string(),
                    agent: Some(AgentBinding {
                        address: "192.168.0.10".parse().unwrap(),
                        port: None,
                    }),
                })
                .unwrap();
            store
                .put_instance(&Instance {
                    id: instance.to_string(),
                    tenant_id: tenant.to_string(),
                    internal_ip: "172.16.0.2".to_string(),
                })
                .unwrap();
        }
    }

    fn map_req(instance_id: &str) -> MapRequest {
        MapRequest {
            pool_name: None,
            instance_id: instance_id.to_string(),
        }
    }

    #[tokio::test]
    async fn map_then_release() {
        let (state, store) = test_state_with(QuotaLimits::default());
        seed(&store);
        state
            .pools
            .add_pool("pool-a", None, &["203.0.113.5".to_string()])
            .unwrap();

        let resp = map_external_ip(State(state.clone()), Json(map_req("inst-1"))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = get_mapped_ip(State(state.clone()), Path("203.0.113.5".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = release_mapped_ip(State(state.clone()), Path("203.0.113.5".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.get_mapped_ips(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_pools_are_conflict() {
        let (state, store) = test_state_with(QuotaLimits::default());
        seed(&store);
        let resp = map_external_ip(State(state), Json(map_req("inst-1"))).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn quota_denial_is_forbidden() {
        let (state, store) = test_state_with(QuotaLimits::default().with_tenant_limit("t1", 0));
        seed(&store);
        state
            .pools
            .add_pool("pool-a", None, &["203.0.113.5".to_string()])
            .unwrap();

        let resp = map_tenant_external_ip(
            State(state),
            Path("t1".to_string()),
            Json(map_req("inst-1")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn tenant_routes_hide_other_tenants() {
        let (state, store) = test_state_with(QuotaLimits::default());
        seed(&store);
        state
            .pools
            .add_pool("pool-a", Some("10.0.0.0/29"), &[])
            .unwrap();
        let mapped = state
            .allocator
            .map_address(&Scope::Admin, None, "inst-1")
            .await
            .unwrap();

        let resp = get_tenant_mapped_ip(
            State(state.clone()),
            Path(("t2".to_string(), mapped.external_ip.clone())),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = release_tenant_mapped_ip(
            State(state.clone()),
            Path(("t2".to_string(), mapped.external_ip.clone())),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = map_tenant_external_ip(
            State(state.clone()),
            Path("t2".to_string()),
            Json(map_req("inst-1")),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = get_tenant_mapped_ip(State(state), Path(("t1".to_string(), mapped.id))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_tenant_mappings() {
        let (state, store) = test_state_with(QuotaLimits::default());
        seed(&store);
        let resp = list_tenant_mapped_ips(State(state), Path("t1".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
