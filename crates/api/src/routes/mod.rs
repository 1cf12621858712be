pub mod auth;
pub mod billing;
pub mod entitlements;
pub mod generations;
pub mod usage;

use axum::{middleware::from_fn_with_state, routing::get, Json, Router};
use http::HeaderValue;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::ToSchema;

use crate::{middleware::AuthState, state::AppState};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// API version
    pub version: &'static str,
}

/// Health check endpoint
///
/// Returns the health status of the API service. This endpoint is typically used by
/// load balancers, monitoring systems, and orchestration tools to verify service availability.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn is_origin_allowed(origin_str: &str, cors_config: &config::CorsConfig) -> bool {
    if cors_config.exact_matches.iter().any(|o| o == origin_str) {
        return true;
    }

    if let Some(remainder) = origin_str.strip_prefix("http://localhost") {
        if remainder.is_empty() || remainder.starts_with(':') {
            return true;
        }
    }

    if let Some(remainder) = origin_str.strip_prefix("http://127.0.0.1") {
        if remainder.is_empty() || remainder.starts_with(':') {
            return true;
        }
    }

    if origin_str.starts_with("https://")
        && cors_config
            .wildcard_suffixes
            .iter()
            .any(|suffix| origin_str.ends_with(suffix))
    {
        return true;
    }

    false
}

/// Create the main API router with CORS configuration
pub fn create_router_with_cors(app_state: AppState, cors_config: config::CorsConfig) -> Router {
    // Create auth state for middleware
    let auth_state = AuthState {
        session_repository: app_state.session_repository.clone(),
    };

    // Dev-login route (public; the handler itself 404s when disabled)
    let auth_routes = auth::create_auth_router();

    // Logout route (requires authentication)
    let logout_route = Router::new()
        .route("/logout", axum::routing::post(auth::logout))
        .layer(from_fn_with_state(
            auth_state.clone(),
            crate::middleware::auth_middleware,
        ));

    // Entitlements route (optional auth: anonymous callers get the free tier)
    let entitlement_routes = entitlements::create_entitlements_router().layer(from_fn_with_state(
        auth_state.clone(),
        crate::middleware::optional_auth_middleware,
    ));

    // Usage counter routes (requires authentication)
    let usage_routes = usage::create_usage_router().layer(from_fn_with_state(
        auth_state.clone(),
        crate::middleware::auth_middleware,
    ));

    // Generation routes (requires authentication)
    let generation_routes = generations::create_generations_router().layer(from_fn_with_state(
        auth_state.clone(),
        crate::middleware::auth_middleware,
    ));

    // Plan catalog is public; checkout requires authentication
    let billing_public_routes = billing::create_billing_public_router();
    let billing_routes = billing::create_billing_router().layer(from_fn_with_state(
        auth_state,
        crate::middleware::auth_middleware,
    ));

    // Build the base router
    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/v1/auth", auth_routes)
        .nest("/v1/auth", logout_route) // Logout route with auth middleware
        .merge(entitlement_routes) // Merge instead of nest since routes already have /v1 prefix
        .merge(usage_routes)
        .merge(generation_routes)
        .merge(billing_public_routes)
        .merge(billing_routes)
        .with_state(app_state);

    let cors_config_clone = cors_config.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _request_parts: &http::request::Parts| {
                let origin_str = match origin.to_str() {
                    Ok(s) => s,
                    Err(_) => return false,
                };
                is_origin_allowed(origin_str, &cors_config_clone)
            },
        ))
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    router.layer(cors)
}
