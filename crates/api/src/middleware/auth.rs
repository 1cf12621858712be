use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use services::auth::{hash_session_token, SessionRepository};
use services::{SessionId, UserId};
use std::sync::Arc;

use crate::error::ApiError;

/// Authenticated user information inserted into request extensions by the auth middleware.
/// Extract in route handlers using `Extension<AuthenticatedUser>`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
    pub session_id: SessionId,
}

/// State for authentication middleware
#[derive(Clone)]
pub struct AuthState {
    pub session_repository: Arc<dyn SessionRepository>,
}

/// Extract and validate token from Authorization header
fn extract_token_from_request(request: &Request) -> Result<String, ApiError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let auth_value = auth_header.ok_or_else(|| {
        tracing::debug!("No authorization header found");
        ApiError::missing_auth_header()
    })?;

    let token = auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("Authorization header does not start with 'Bearer '");
        ApiError::invalid_auth_header()
    })?;

    // Shape gate before any hashing or lookup
    if !token.starts_with("sess_") {
        tracing::warn!("Invalid session token format: token does not start with 'sess_'");
        return Err(ApiError::invalid_token());
    }

    if token.len() != 37 {
        tracing::warn!(
            "Invalid session token format: expected length 37, got {}",
            token.len()
        );
        return Err(ApiError::invalid_token());
    }

    Ok(token.to_string())
}

/// Authenticate a token string against the session store
async fn authenticate_token_string(
    token: String,
    state: &AuthState,
) -> Result<AuthenticatedUser, ApiError> {
    let token_hash = hash_session_token(&token);

    let session = state
        .session_repository
        .get_session_by_token_hash(token_hash.clone())
        .await
        .map_err(|e| {
            tracing::error!(
                "Failed to get session from repository for token_hash {}...: {}",
                &token_hash.chars().take(16).collect::<String>(),
                e
            );
            ApiError::internal_server_error("Failed to authenticate session")
        })?
        .ok_or_else(|| {
            tracing::warn!(
                "Session not found for token_hash: {}...",
                &token_hash.chars().take(16).collect::<String>()
            );
            ApiError::session_not_found()
        })?;

    let now = Utc::now();
    if session.expires_at < now {
        tracing::warn!(
            "Session expired: session_id={}, expired {} seconds ago",
            session.session_id,
            now.signed_duration_since(session.expires_at).num_seconds()
        );
        return Err(ApiError::session_expired());
    }

    tracing::debug!(
        "Authenticated session: user_id={}, session_id={}",
        session.user_id,
        session.session_id
    );

    Ok(AuthenticatedUser {
        user_id: session.user_id,
        email: session.email,
        session_id: session.session_id,
    })
}

/// Authentication middleware that validates session tokens
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    let token = extract_token_from_request(&request).map_err(|e| e.into_response())?;
    let user = authenticate_token_string(token, &state)
        .await
        .map_err(|e| e.into_response())?;

    tracing::debug!(
        "Authentication successful for user_id={} on {} {}",
        user.user_id,
        method,
        path
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Optional authentication middleware - doesn't fail if no token provided.
/// Inserts `Option<AuthenticatedUser>` into request extensions; used by the
/// entitlement check endpoint, which answers unauthenticated callers with the
/// free-tier payload instead of a 401.
pub async fn optional_auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    let user: Option<AuthenticatedUser> = match extract_token_from_request(&request) {
        Ok(token) => match authenticate_token_string(token, &state).await {
            Ok(user) => {
                tracing::debug!(
                    "Optional auth: authenticated user_id={} on {} {}",
                    user.user_id,
                    method,
                    path
                );
                Some(user)
            }
            Err(e) => {
                tracing::debug!(
                    "Optional auth: token validation failed on {} {}: {:?}",
                    method,
                    path,
                    e
                );
                None
            }
        },
        Err(_) => {
            tracing::debug!("Optional auth: no token provided on {} {}", method, path);
            None
        }
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
