use axum::{extract::State, routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::entitlement::{EntitlementError, EntitlementSnapshot, PlanLimits};
use utoipa::ToSchema;

use crate::{error::ApiError, middleware::AuthenticatedUser, state::AppState};

/// Authoritative entitlement state for the caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EntitlementResponse {
    /// Whether an active subscription was confirmed with the billing provider
    pub subscribed: bool,
    /// Resolved plan name, null when unsubscribed or unrecognized
    pub plan: Option<String>,
    /// End of the current billing period, when known
    pub subscription_end: Option<DateTime<Utc>>,
    pub rfq_count: i64,
    pub proposal_count: i64,
    /// Null means unlimited
    pub rfq_limit: Option<i64>,
    /// Null means unlimited
    pub proposal_limit: Option<i64>,
}

impl From<EntitlementSnapshot> for EntitlementResponse {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        Self {
            subscribed: snapshot.subscribed,
            plan: snapshot.plan,
            subscription_end: snapshot.subscription_end,
            rfq_count: snapshot.rfq_count,
            proposal_count: snapshot.proposal_count,
            rfq_limit: snapshot.rfq_limit,
            proposal_limit: snapshot.proposal_limit,
        }
    }
}

impl EntitlementResponse {
    /// Payload served to unauthenticated callers: the free tier with zero
    /// usage. Pricing pages probe this endpoint before login, so missing
    /// auth is answered with data rather than a 401.
    fn unauthenticated() -> Self {
        let limits = PlanLimits::free();
        Self {
            subscribed: false,
            plan: None,
            subscription_end: None,
            rfq_count: 0,
            proposal_count: 0,
            rfq_limit: limits.rfq_limit,
            proposal_limit: limits.proposal_limit,
        }
    }
}

/// Check the caller's entitlements
///
/// Resolves live subscription state with the billing provider, persists it,
/// and returns it merged with the usage counters. Responses carry the
/// authoritative counts; clients must treat them as read-through state.
#[utoipa::path(
    get,
    path = "/v1/entitlements",
    tag = "Entitlements",
    responses(
        (status = 200, description = "Entitlement state (free tier when unauthenticated)", body = EntitlementResponse),
        (status = 502, description = "Billing provider unavailable", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    ),
    security(
        (),
        ("session_token" = [])
    )
)]
pub async fn get_entitlements(
    State(app_state): State<AppState>,
    Extension(user): Extension<Option<AuthenticatedUser>>,
) -> Result<Json<EntitlementResponse>, ApiError> {
    let Some(user) = user else {
        tracing::debug!("Unauthenticated entitlement check, serving free tier");
        return Ok(Json(EntitlementResponse::unauthenticated()));
    };

    let snapshot = app_state
        .entitlement_service
        .resolve(user.user_id, &user.email)
        .await
        .map_err(|e| match e {
            EntitlementError::ProviderUnavailable(msg) => {
                tracing::error!(error = ?msg, "Billing provider unavailable during entitlement check");
                ApiError::billing_unavailable()
            }
            EntitlementError::DatabaseError(msg) => {
                tracing::error!(error = ?msg, "Database error during entitlement check");
                ApiError::internal_server_error("Failed to check entitlements")
            }
            EntitlementError::InternalError(msg) => {
                tracing::error!(error = ?msg, "Internal error during entitlement check");
                ApiError::internal_server_error("Failed to check entitlements")
            }
        })?;

    Ok(Json(EntitlementResponse::from(snapshot)))
}

/// Create entitlements router (optional auth is layered in routes::create_router)
pub fn create_entitlements_router() -> Router<AppState> {
    Router::new().route("/v1/entitlements", get(get_entitlements))
}
