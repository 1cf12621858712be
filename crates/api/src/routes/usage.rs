use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use services::profile::UsageKind;
use services::usage::UsageError;
use utoipa::ToSchema;

use crate::{error::ApiError, middleware::AuthenticatedUser, state::AppState};

/// Request to record one unit of usage
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncrementUsageRequest {
    /// Usage kind: "rfq" or "proposal"
    #[serde(rename = "type")]
    pub usage_type: String,
}

/// Result of a usage increment
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncrementUsageResponse {
    pub success: bool,
    pub message: String,
    /// The authoritative post-increment count
    pub count: i64,
}

/// Record one unit of usage for the authenticated user
///
/// Atomically increments the counter for the given kind and returns the new
/// count. Counts only move forward; there is no decrement operation.
#[utoipa::path(
    post,
    path = "/v1/usage/increments",
    tag = "Usage",
    request_body = IncrementUsageRequest,
    responses(
        (status = 200, description = "Usage incremented", body = IncrementUsageResponse),
        (status = 400, description = "Invalid usage type", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("session_token" = [])
    )
)]
pub async fn increment_usage(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<IncrementUsageRequest>,
) -> Result<Json<IncrementUsageResponse>, ApiError> {
    let Some(kind) = UsageKind::parse(&req.usage_type) else {
        return Err(ApiError::bad_request(
            "Invalid usage type. Must be 'rfq' or 'proposal'",
        ));
    };

    let receipt = app_state
        .usage_service
        .increment(user.user_id, &user.email, kind)
        .await
        .map_err(|e| match e {
            UsageError::DatabaseError(msg) => {
                tracing::error!(error = ?msg, "Database error incrementing usage");
                ApiError::internal_server_error("Failed to increment usage")
            }
            UsageError::InternalError(msg) => {
                tracing::error!(error = ?msg, "Internal error incrementing usage");
                ApiError::internal_server_error("Failed to increment usage")
            }
        })?;

    Ok(Json(IncrementUsageResponse {
        success: true,
        message: format!("{} count incremented", kind),
        count: receipt.count,
    }))
}

/// Create usage router (auth is layered in routes::create_router)
pub fn create_usage_router() -> Router<AppState> {
    Router::new().route("/v1/usage/increments", post(increment_usage))
}
