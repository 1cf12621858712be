use async_trait::async_trait;
use std::fmt;

use crate::profile::UsageKind;
use crate::UserId;

/// Input for an RFQ letter generation.
#[derive(Debug, Clone)]
pub struct RfqGenerationRequest {
    /// Text extracted from the uploaded solicitation document.
    pub extracted_text: String,
    pub file_name: String,
}

/// Input for a proposal generation.
#[derive(Debug, Clone)]
pub struct ProposalGenerationRequest {
    /// Merged text of the RFQ and solicitation documents.
    pub merged_text: String,
    pub rfq_file_name: Option<String>,
    pub solicitation_file_name: Option<String>,
}

/// Normalized input handed to the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub kind: UsageKind,
    pub document_text: String,
    /// Originating file names, for prompt context only.
    pub source_files: Vec<String>,
}

/// Result of a successful generation, carrying the authoritative
/// post-reservation counts so client-held state can overwrite itself.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub content: String,
    pub rfq_count: i64,
    pub proposal_count: i64,
}

/// Port to the external generation backend. Any error is a backend failure;
/// the usage reservation made before the call is not refunded.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, input: &GenerationInput) -> anyhow::Result<String>;
}

/// Errors that can occur during the generation workflow
#[derive(Debug)]
pub enum GenerationError {
    /// Request payload failed validation
    InvalidInput(String),
    /// Usage has reached the resolved limit; no reservation was made
    EntitlementExhausted {
        kind: UsageKind,
        count: i64,
        limit: i64,
    },
    /// The usage reservation itself failed; generation was not attempted
    ReservationFailed(String),
    /// The backend failed after the reservation was spent
    BackendFailed(String),
    /// Payment provider unavailable; entitlement unknown, nothing granted
    ProviderUnavailable(String),
    /// Database error
    DatabaseError(String),
    /// Internal error
    InternalError(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "{}", msg),
            Self::EntitlementExhausted { kind, count, limit } => write!(
                f,
                "You have reached your {} generation limit ({}/{}). Please upgrade your plan to continue.",
                kind, count, limit
            ),
            Self::ReservationFailed(msg) => {
                write!(f, "Could not reserve a usage unit: {}", msg)
            }
            Self::BackendFailed(msg) => write!(f, "Generation failed: {}", msg),
            Self::ProviderUnavailable(msg) => {
                write!(f, "Payment provider unavailable: {}", msg)
            }
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<crate::entitlement::EntitlementError> for GenerationError {
    fn from(err: crate::entitlement::EntitlementError) -> Self {
        use crate::entitlement::EntitlementError;
        match err {
            EntitlementError::ProviderUnavailable(msg) => Self::ProviderUnavailable(msg),
            EntitlementError::DatabaseError(msg) => Self::DatabaseError(msg),
            EntitlementError::InternalError(msg) => Self::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

/// Service trait for the generation workflow: entitlement check, pessimistic
/// usage reservation, backend call, and failure reconciliation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate_rfq(
        &self,
        user_id: UserId,
        email: &str,
        request: RfqGenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError>;

    async fn generate_proposal(
        &self,
        user_id: UserId,
        email: &str,
        request: ProposalGenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError>;
}
