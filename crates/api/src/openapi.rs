use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "RFQRocket API",
        description = "Usage entitlements, usage counters, and document generation for government solicitation responses.",
        version = "1.0.0",
        contact(name = "RFQRocket Team", email = "support@rfqrocket.com"),
        license(name = "MIT",)
    ),
    paths(
        // Health endpoint
        crate::routes::health_check,
        // Auth endpoints
        crate::routes::auth::dev_login,
        crate::routes::auth::logout,
        // Entitlement endpoints
        crate::routes::entitlements::get_entitlements,
        // Usage endpoints
        crate::routes::usage::increment_usage,
        // Generation endpoints
        crate::routes::generations::generate_rfq,
        crate::routes::generations::generate_proposal,
        // Billing endpoints
        crate::routes::billing::get_plans,
        crate::routes::billing::create_checkout,
    ),
    components(schemas(
        // Request/Response models
        crate::routes::HealthResponse,
        crate::routes::auth::DevLoginRequest,
        crate::routes::auth::LoginResponse,
        crate::routes::entitlements::EntitlementResponse,
        crate::routes::usage::IncrementUsageRequest,
        crate::routes::usage::IncrementUsageResponse,
        crate::routes::generations::GenerateRfqRequest,
        crate::routes::generations::GenerateRfqResponse,
        crate::routes::generations::GenerateProposalRequest,
        crate::routes::generations::GenerateProposalResponse,
        crate::routes::billing::CreateCheckoutRequest,
        crate::error::ApiErrorResponse,
        // Billing catalog models
        services::entitlement::PlanSpec,
        services::entitlement::PlanCatalog,
        services::billing::CheckoutSession,
        services::UserId,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Auth", description = "Session authentication endpoints"),
        (name = "Entitlements", description = "Resolved subscription entitlements and usage counts"),
        (name = "Usage", description = "Usage counter endpoints"),
        (name = "Generations", description = "RFQ and proposal generation endpoints"),
        (name = "Billing", description = "Plan catalog and checkout endpoints")
    )
)]
pub struct ApiDoc;

/// Security scheme addon for Bearer token authentication
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("session_token")
                        .description(Some("Session token obtained from login"))
                        .build(),
                ),
            )
        }
    }
}
