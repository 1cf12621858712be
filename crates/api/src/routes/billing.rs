use axum::{
    extract::State,
    http::{header::ORIGIN, HeaderMap, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use services::billing::{BillingError, BillingInterval, CheckoutSession};
use services::entitlement::PlanCatalog;
use utoipa::ToSchema;

use crate::{error::ApiError, middleware::AuthenticatedUser, state::AppState};

/// Request to start a hosted checkout for a plan purchase
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    /// Plan name as listed by GET /v1/billing/plans
    pub plan_name: String,
    /// Optional promo code, matched case-insensitively
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Bill annually instead of monthly (defaults to monthly)
    #[serde(default)]
    pub is_annual: Option<bool>,
}

fn map_billing_error(e: BillingError) -> ApiError {
    match e {
        BillingError::NotConfigured => {
            tracing::error!("Checkout requested but payment provider is not configured");
            ApiError::service_unavailable("Payment provider is not configured")
        }
        BillingError::InvalidPlan(_)
        | BillingError::InvalidInterval(_)
        | BillingError::InvalidOrigin(_) => ApiError::bad_request(e.to_string()),
        BillingError::ProviderError(msg) => {
            tracing::error!(error = ?msg, "Payment provider call failed");
            ApiError::new(
                StatusCode::BAD_GATEWAY,
                "billing_unavailable",
                "Unable to reach the billing provider. Please try again.",
            )
        }
        BillingError::DatabaseError(msg) => {
            tracing::error!(error = ?msg, "Database error in billing");
            ApiError::internal_server_error("Failed to process billing request")
        }
        BillingError::InternalError(msg) => {
            tracing::error!(error = ?msg, "Internal error in billing");
            ApiError::internal_server_error("Failed to process billing request")
        }
    }
}

/// List purchasable plans
///
/// Public endpoint; the catalog drives the pricing page.
#[utoipa::path(
    get,
    path = "/v1/billing/plans",
    tag = "Billing",
    responses(
        (status = 200, description = "Plan catalog", body = PlanCatalog),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn get_plans(
    State(app_state): State<AppState>,
) -> Result<Json<PlanCatalog>, ApiError> {
    let catalog = app_state
        .billing_service
        .get_available_plans()
        .await
        .map_err(map_billing_error)?;
    Ok(Json(catalog))
}

/// Create a checkout session
///
/// Validates the plan, interval, promo code, and the caller's Origin header,
/// then returns the provider-hosted checkout URL.
#[utoipa::path(
    post,
    path = "/v1/billing/checkout",
    tag = "Billing",
    request_body = CreateCheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutSession),
        (status = 400, description = "Invalid plan, interval, promo code, or origin", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 502, description = "Payment provider call failed", body = crate::error::ApiErrorResponse),
        (status = 503, description = "Payment provider not configured", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("session_token" = [])
    )
)]
pub async fn create_checkout(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let origin = headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Origin header is required"))?;

    let interval = BillingInterval::from_is_annual(req.is_annual.unwrap_or(false));
    tracing::info!(
        "Checkout requested: user_id={} plan={} interval={}",
        user.user_id,
        req.plan_name,
        interval
    );

    let session = app_state
        .billing_service
        .create_checkout(
            user.user_id,
            &user.email,
            &req.plan_name,
            interval,
            req.promo_code.as_deref(),
            origin,
        )
        .await
        .map_err(map_billing_error)?;

    Ok(Json(session))
}

/// Public billing routes (plan catalog)
pub fn create_billing_public_router() -> Router<AppState> {
    Router::new().route("/v1/billing/plans", get(get_plans))
}

/// Authenticated billing routes (checkout)
pub fn create_billing_router() -> Router<AppState> {
    Router::new().route("/v1/billing/checkout", post(create_checkout))
}
