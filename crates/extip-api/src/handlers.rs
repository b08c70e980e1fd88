//! REST API handlers for pool management.
//!
//! Each handler calls into `PoolManager` and returns the JSON envelope.
//! Error kinds map to statuses in [`status_for`].

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use extip_alloc::AllocError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// HTTP status for an allocator error.
pub fn status_for(err: &AllocError) -> StatusCode {
    match err {
        AllocError::BadRequest(_) | AllocError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        AllocError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
        AllocError::NotFound(_) => StatusCode::NOT_FOUND,
        AllocError::DuplicatePoolName(_) | AllocError::InUse(_) | AllocError::PoolEmpty(_) => {
            StatusCode::CONFLICT
        }
        AllocError::Agent(_) => StatusCode::BAD_GATEWAY,
        AllocError::Interrupted(_) | AllocError::Quota(_) | AllocError::State(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn alloc_error(err: AllocError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    error_response(&err.to_string(), status).into_response()
}

// ── Pools ──────────────────────────────────────────────────────

/// Create-pool request body. At most one of `subnet` and `ips` is used;
/// `subnet` wins when both are given.
#[derive(Debug, serde::Deserialize)]
pub struct CreatePoolRequest {
    pub name: String,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
}

/// Add-address request body.
#[derive(Debug, serde::Deserialize)]
pub struct AddAddressRequest {
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub ips: Vec<String>,
}

/// GET /api/v1/pools
pub async fn list_pools(State(state): State<ApiState>) -> Response {
    match state.pools.list_pools() {
        Ok(pools) => ApiResponse::ok(pools).into_response(),
        Err(e) => alloc_error(e),
    }
}

/// POST /api/v1/pools
pub async fn create_pool(
    State(state): State<ApiState>,
    Json(req): Json<CreatePoolRequest>,
) -> Response {
    match state.pools.add_pool(&req.name, req.subnet.as_deref(), &req.ips) {
        Ok(pool) => (StatusCode::CREATED, ApiResponse::ok(pool)).into_response(),
        Err(e) => alloc_error(e),
    }
}

/// GET /api/v1/pools/:id
pub async fn get_pool(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.pools.show_pool(&id) {
        Ok(pool) => ApiResponse::ok(pool).into_response(),
        Err(e) => alloc_error(e),
    }
}

/// POST /api/v1/pools/:id
pub async fn add_pool_addresses(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<AddAddressRequest>,
) -> Response {
    let added = state
        .pools
        .add_address(&id, req.subnet.as_deref(), &req.ips)
        .and_then(|()| state.pools.show_pool(&id));
    match added {
        Ok(pool) => ApiResponse::ok(pool).into_response(),
        Err(e) => alloc_error(e),
    }
}

/// DELETE /api/v1/pools/:id
pub async fn delete_pool(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    match state.pools.delete_pool(&id) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => alloc_error(e),
    }
}

/// DELETE /api/v1/pools/:id/subnets/:subnet_id
pub async fn remove_subnet(
    State(state): State<ApiState>,
    Path((id, subnet_id)): Path<(String, String)>,
) -> Response {
    match state.pools.remove_address(&id, Some(&subnet_id), None) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => alloc_error(e),
    }
}

/// DELETE /api/v1/pools/:id/external-ips/:ip_id
pub async fn remove_external_ip(
    State(state): State<ApiState>,
    Path((id, ip_id)): Path<(String, String)>,
) -> Response {
    match state.pools.remove_address(&id, None, Some(&ip_id)) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => alloc_error(e),
    }
}
