use std::sync::Arc;

use services::{
    auth::{AuthService, SessionRepository},
    billing::BillingService,
    entitlement::EntitlementService,
    generation::GenerationService,
    usage::UsageService,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub entitlement_service: Arc<dyn EntitlementService>,
    pub usage_service: Arc<dyn UsageService>,
    pub generation_service: Arc<dyn GenerationService>,
    pub billing_service: Arc<dyn BillingService>,
    pub session_repository: Arc<dyn SessionRepository>,
    /// Gate for the dev/test login endpoint; 404 when disabled
    pub dev_login_enabled: bool,
}
