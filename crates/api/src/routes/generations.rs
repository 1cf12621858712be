use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use services::generation::{
    GenerationError, ProposalGenerationRequest, RfqGenerationRequest,
};
use utoipa::ToSchema;

use crate::{error::ApiError, middleware::AuthenticatedUser, state::AppState};

/// Request to generate an RFQ letter from an uploaded solicitation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateRfqRequest {
    /// Text extracted from the solicitation document (extraction happens client-side)
    pub extracted_text: String,
    /// Name of the source file, echoed back and used for prompt context
    pub file_name: String,
}

/// Generated RFQ letter plus the authoritative usage count
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateRfqResponse {
    pub rfq_content: String,
    pub file_name: String,
    /// RFQ count after the reservation for this generation
    pub rfq_count: i64,
}

/// Request to generate a proposal from merged RFQ and solicitation text
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateProposalRequest {
    /// Merged text of the RFQ and solicitation documents
    pub merged_text: String,
    #[serde(default)]
    pub rfq_file_name: Option<String>,
    #[serde(default)]
    pub solicitation_file_name: Option<String>,
}

/// Generated proposal plus the authoritative usage count
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateProposalResponse {
    pub proposal_content: String,
    pub rfq_file_name: Option<String>,
    pub solicitation_file_name: Option<String>,
    /// Proposal count after the reservation for this generation
    pub proposal_count: i64,
}

fn map_generation_error(e: GenerationError) -> ApiError {
    match e {
        GenerationError::InvalidInput(msg) => ApiError::bad_request(msg),
        GenerationError::EntitlementExhausted { .. } => {
            ApiError::entitlement_exhausted(e.to_string())
        }
        GenerationError::ReservationFailed(msg) => {
            tracing::error!(error = ?msg, "Usage reservation failed");
            ApiError::reservation_failed()
        }
        GenerationError::BackendFailed(msg) => {
            tracing::error!(error = ?msg, "Generation backend failed after reservation");
            ApiError::generation_failed()
        }
        GenerationError::ProviderUnavailable(msg) => {
            tracing::error!(error = ?msg, "Billing provider unavailable during generation");
            ApiError::billing_unavailable()
        }
        GenerationError::DatabaseError(msg) => {
            tracing::error!(error = ?msg, "Database error during generation");
            ApiError::internal_server_error("Failed to generate document")
        }
        GenerationError::InternalError(msg) => {
            tracing::error!(error = ?msg, "Internal error during generation");
            ApiError::internal_server_error("Failed to generate document")
        }
    }
}

/// Generate an RFQ letter
///
/// Checks entitlements, reserves one RFQ unit by incrementing the counter,
/// then calls the generation backend. A backend failure after the reservation
/// does not refund the unit.
#[utoipa::path(
    post,
    path = "/v1/generations/rfq",
    tag = "Generations",
    request_body = GenerateRfqRequest,
    responses(
        (status = 200, description = "RFQ generated", body = GenerateRfqResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 403, description = "Generation limit reached", body = crate::error::ApiErrorResponse),
        (status = 502, description = "Generation backend or billing provider failed", body = crate::error::ApiErrorResponse),
        (status = 503, description = "Usage reservation failed", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("session_token" = [])
    )
)]
pub async fn generate_rfq(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<GenerateRfqRequest>,
) -> Result<Json<GenerateRfqResponse>, ApiError> {
    tracing::info!("RFQ generation requested by user_id={}", user.user_id);

    let file_name = req.file_name.clone();
    let outcome = app_state
        .generation_service
        .generate_rfq(
            user.user_id,
            &user.email,
            RfqGenerationRequest {
                extracted_text: req.extracted_text,
                file_name: req.file_name,
            },
        )
        .await
        .map_err(map_generation_error)?;

    Ok(Json(GenerateRfqResponse {
        rfq_content: outcome.content,
        file_name,
        rfq_count: outcome.rfq_count,
    }))
}

/// Generate a proposal
///
/// Same reservation semantics as RFQ generation, charged against the
/// proposal counter.
#[utoipa::path(
    post,
    path = "/v1/generations/proposal",
    tag = "Generations",
    request_body = GenerateProposalRequest,
    responses(
        (status = 200, description = "Proposal generated", body = GenerateProposalResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorResponse),
        (status = 403, description = "Generation limit reached", body = crate::error::ApiErrorResponse),
        (status = 502, description = "Generation backend or billing provider failed", body = crate::error::ApiErrorResponse),
        (status = 503, description = "Usage reservation failed", body = crate::error::ApiErrorResponse)
    ),
    security(
        ("session_token" = [])
    )
)]
pub async fn generate_proposal(
    State(app_state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<GenerateProposalRequest>,
) -> Result<Json<GenerateProposalResponse>, ApiError> {
    tracing::info!("Proposal generation requested by user_id={}", user.user_id);

    let rfq_file_name = req.rfq_file_name.clone();
    let solicitation_file_name = req.solicitation_file_name.clone();
    let outcome = app_state
        .generation_service
        .generate_proposal(
            user.user_id,
            &user.email,
            ProposalGenerationRequest {
                merged_text: req.merged_text,
                rfq_file_name: req.rfq_file_name,
                solicitation_file_name: req.solicitation_file_name,
            },
        )
        .await
        .map_err(map_generation_error)?;

    Ok(Json(GenerateProposalResponse {
        proposal_content: outcome.content,
        rfq_file_name,
        solicitation_file_name,
        proposal_count: outcome.proposal_count,
    }))
}

/// Create generations router (auth is layered in routes::create_router)
pub fn create_generations_router() -> Router<AppState> {
    Router::new()
        .route("/v1/generations/rfq", post(generate_rfq))
        .route("/v1/generations/proposal", post(generate_proposal))
}
