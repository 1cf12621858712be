use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Structured error response returned to API consumers
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ApiErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Convenient wrapper type for API errors that combines status code with error response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Add optional details to the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.response.details = Some(details.into());
        self
    }

    /// 400 Bad Request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// 401 Unauthorized
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    /// 404 Not Found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 500 Internal Server Error
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_server_error",
            message,
        )
    }

    /// 503 Service Unavailable
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "service_unavailable",
            message,
        )
    }

    // Auth-specific errors with more context

    /// Invalid or malformed session token
    pub fn invalid_token() -> Self {
        Self::unauthorized("Invalid or malformed session token")
            .with_details("Session token must start with 'sess_' and be 37 characters long")
    }

    /// Session token not found
    pub fn session_not_found() -> Self {
        Self::unauthorized("Session not found").with_details(
            "The provided session token does not match any active session. Please log in again.",
        )
    }

    /// Session expired
    pub fn session_expired() -> Self {
        Self::unauthorized("Session has expired")
            .with_details("Your session has expired. Please log in again to continue.")
    }

    /// Missing authorization header
    pub fn missing_auth_header() -> Self {
        Self::unauthorized("Missing authorization header")
            .with_details("Request must include an Authorization header with a Bearer token")
    }

    /// Invalid authorization header format
    pub fn invalid_auth_header() -> Self {
        Self::unauthorized("Invalid authorization header format")
            .with_details("Authorization header must be in the format: 'Bearer <token>'")
    }

    /// Failed to logout
    pub fn logout_failed() -> Self {
        Self::internal_server_error("Failed to logout")
            .with_details("An error occurred while revoking your session")
    }

    // Entitlement and generation errors

    /// Usage limit reached for the requested generation kind
    pub fn entitlement_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "entitlement_exhausted", message)
    }

    /// The usage counter could not be incremented; nothing was generated
    pub fn reservation_failed() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "reservation_failed",
            "Could not reserve a generation unit. Please try again.",
        )
    }

    /// Generation backend failed after the usage unit was reserved
    pub fn generation_failed() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "generation_failed",
            "Document generation failed. A generation unit was already reserved and is reflected in your usage counts.",
        )
    }

    /// Billing provider could not be reached; entitlement is unknown
    pub fn billing_unavailable() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "billing_unavailable",
            "Unable to verify your subscription with the billing provider. Please try again.",
        )
    }
}

/// Implement IntoResponse so ApiError can be returned directly from handlers
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

/// Convert from anyhow::Error for convenience in services
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::internal_server_error("An internal error occurred")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_error() {
        let err = ApiError::bad_request("Invalid input");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.response.code, "bad_request");
        assert_eq!(err.response.message, "Invalid input");
        assert!(err.response.details.is_none());
    }

    #[test]
    fn test_error_with_details() {
        let err = ApiError::unauthorized("Access denied").with_details("Token expired");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.response.details, Some("Token expired".to_string()));
    }

    #[test]
    fn test_auth_specific_errors() {
        let err = ApiError::invalid_token();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert!(err.response.details.is_some());
    }

    #[test]
    fn test_domain_error_codes() {
        assert_eq!(
            ApiError::entitlement_exhausted("limit reached").response.code,
            "entitlement_exhausted"
        );
        assert_eq!(ApiError::reservation_failed().status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::generation_failed().status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::billing_unavailable().response.code,
            "billing_unavailable"
        );
    }
}
