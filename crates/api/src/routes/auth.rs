use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use services::auth::AuthError;
use services::UserId;
use utoipa::ToSchema;

use crate::{error::ApiError, middleware::AuthenticatedUser, state::AppState};

/// Request body for the dev/test login endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DevLoginRequest {
    /// Email identifying the account; find-or-created on first login
    pub email: String,
    /// Display name, applied only when the account is first created
    #[serde(default)]
    pub name: Option<String>,
}

/// Response containing the freshly minted session token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer session token; returned exactly once
    pub token: String,
    pub user_id: UserId,
    pub email: String,
}

/// Log in with an email address (development/testing only)
///
/// Provisions the account on first sight and mints a session token. Returns
/// 404 unless dev login is enabled in configuration; production deployments
/// provision sessions through an upstream identity provider instead.
#[utoipa::path(
    post,
    path = "/v1/auth/dev-login",
    tag = "Auth",
    request_body = DevLoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid email", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Dev login is disabled", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn dev_login(
    State(app_state): State<AppState>,
    Json(req): Json<DevLoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if !app_state.dev_login_enabled {
        return Err(ApiError::not_found("Not found"));
    }

    let outcome = app_state
        .auth_service
        .login_with_email(&req.email, req.name.as_deref())
        .await
        .map_err(|e| match e {
            AuthError::InvalidEmail(msg) => ApiError::bad_request(msg),
            AuthError::DatabaseError(msg) => {
                tracing::error!(error = ?msg, "Database error during login");
                ApiError::internal_server_error("Failed to log in")
            }
            AuthError::InternalError(msg) => {
                tracing::error!(error = ?msg, "Internal error during login");
                ApiError::internal_server_error("Failed to log in")
            }
        })?;

    let token = outcome.session.token.ok_or_else(|| {
        tracing::error!("Created session carried no token");
        ApiError::internal_server_error("Failed to log in")
    })?;

    Ok(Json(LoginResponse {
        token,
        user_id: outcome.user.id,
        email: outcome.user.email,
    }))
}

/// Log out the current session
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Auth",
    responses(
        (status = 204, description = "Successfully logged out"),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("session_token" = [])
    )
)]
pub async fn logout(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<StatusCode, ApiError> {
    app_state
        .auth_service
        .logout(user.session_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to revoke session {}: {}", user.session_id, e);
            ApiError::logout_failed()
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Create public auth router (dev login; logout is layered with auth in routes::create_router)
pub fn create_auth_router() -> Router<AppState> {
    Router::new().route("/dev-login", post(dev_login))
}
