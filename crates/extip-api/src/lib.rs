//! extip-api — REST API for the external-address controller.
//!
//! Administrators manage pools and see every mapping; tenants see and
//! manage only the mappings of their own instances.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/pools` | List pools |
//! | POST | `/api/v1/pools` | Create a pool, optionally with addresses |
//! | GET | `/api/v1/pools/{id}` | Show a pool |
//! | POST | `/api/v1/pools/{id}` | Add a subnet or addresses to a pool |
//! | DELETE | `/api/v1/pools/{id}` | Delete an unused pool |
//! | DELETE | `/api/v1/pools/{id}/subnets/{subnet_id}` | Remove a subnet |
//! | DELETE | `/api/v1/pools/{id}/external-ips/{ip_id}` | Remove an address |
//! | GET | `/api/v1/external-ips` | List all mappings |
//! | POST | `/api/v1/external-ips` | Map an address to an instance |
//! | GET | `/api/v1/external-ips/{address}` | Show a mapping |
//! | DELETE | `/api/v1/external-ips/{address}` | Release a mapping |
//! | GET | `/api/v1/{tenant}/external-ips` | List the tenant's mappings |
//! | POST | `/api/v1/{tenant}/external-ips` | Map an address to the tenant's instance |
//! | GET | `/api/v1/{tenant}/external-ips/{address}` | Show one of the tenant's mappings |
//! | DELETE | `/api/v1/{tenant}/external-ips/{address}` | Release one of the tenant's mappings |
//!
//! `{address}` accepts either the external address or the mapping ID.
//!
//! Static segments win over `{tenant}`, so `pools` and `external-ips` can
//! never name a tenant here. The store refuses those IDs
//! (`extip_state::RESERVED_TENANT_IDS`).

pub mod handlers;
pub mod mapping_handlers;

use axum::Router;
use axum::routing::{delete, get};

use extip_alloc::{AddressAllocator, PoolManager};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub pools: PoolManager,
    pub allocator: AddressAllocator,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/pools", get(handlers::list_pools).post(handlers::create_pool))
        .route(
            "/pools/{id}",
            get(handlers::get_pool)
                .post(handlers::add_pool_addresses)
                .delete(handlers::delete_pool),
        )
        .route("/pools/{id}/subnets/{subnet_id}", delete(handlers::remove_subnet))
        .route("/pools/{id}/external-ips/{ip_id}", delete(handlers::remove_external_ip))
        .route(
            "/external-ips",
            get(mapping_handlers::list_mapped_ips).post(mapping_handlers::map_external_ip),
        )
        .route(
            "/external-ips/{address}",
            get(mapping_handlers::get_mapped_ip).delete(mapping_handlers::release_mapped_ip),
        )
        .route(
            "/{tenant}/external-ips",
            get(mapping_handlers::list_tenant_mapped_ips)
                .post(mapping_handlers::map_tenant_external_ip),
        )
        .route(
            "/{tenant}/external-ips/{address}",
            get(mapping_handlers::get_tenant_mapped_ip)
                .delete(mapping_handlers::release_tenant_mapped_ip),
        )
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
