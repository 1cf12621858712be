#![allow(dead_code)]

use std::sync::Arc;

use api::{create_router_with_cors, AppState};
use axum_test::TestServer;
use serde_json::json;
use services::auth::service::test_helpers::{InMemorySessionRepository, InMemoryUserRepository};
use services::auth::AuthServiceImpl;
use services::billing::service::test_helpers::{InMemoryPromoCodeRepository, MockBillingProvider};
use services::billing::BillingServiceImpl;
use services::entitlement::service::test_helpers::InMemoryAppConfigRepository;
use services::entitlement::{EntitlementServiceImpl, PlanCatalog, PlanCatalogCache};
use services::generation::service::test_helpers::MockGenerationBackend;
use services::generation::GenerationServiceImpl;
use services::profile::test_helpers::InMemoryProfileRepository;
use services::profile::ProfileRepository;
use services::usage::UsageServiceImpl;

/// Test server plus handles to the in-memory stores and mocks behind it,
/// for seeding state and asserting on side effects.
pub struct TestApp {
    pub server: TestServer,
    pub profiles: Arc<InMemoryProfileRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub app_configs: Arc<InMemoryAppConfigRepository>,
    pub promo_codes: Arc<InMemoryPromoCodeRepository>,
    pub billing: Arc<MockBillingProvider>,
    pub backend: Arc<MockGenerationBackend>,
}

/// Configuration for the test server: dev login enabled, a configured mock
/// billing provider with no customers, and a backend that always succeeds.
pub struct TestServerConfig {
    pub dev_login_enabled: bool,
    pub billing: MockBillingProvider,
    pub backend: MockGenerationBackend,
    /// Overrides the in-memory profile store. The `profiles` handle on the
    /// returned `TestApp` does not observe writes when this is set.
    pub profile_repository: Option<Arc<dyn ProfileRepository>>,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            dev_login_enabled: true,
            billing: MockBillingProvider::new(),
            backend: MockGenerationBackend::new(),
            profile_repository: None,
        }
    }
}

/// Create a test server with all services wired to in-memory stores
pub async fn create_test_app() -> TestApp {
    create_test_app_with_config(TestServerConfig::default()).await
}

/// Create a test server with custom configuration
pub async fn create_test_app_with_config(test_config: TestServerConfig) -> TestApp {
    let profiles = Arc::new(InMemoryProfileRepository::new());
    let profile_repository: Arc<dyn ProfileRepository> = match test_config.profile_repository {
        Some(repo) => repo,
        None => profiles.clone(),
    };

    let users = Arc::new(InMemoryUserRepository::new());
    let sessions = Arc::new(InMemorySessionRepository::new());
    let app_configs = Arc::new(InMemoryAppConfigRepository::new());
    let promo_codes = Arc::new(InMemoryPromoCodeRepository::new());
    let billing = Arc::new(test_config.billing);
    let backend = Arc::new(test_config.backend);

    // Create services
    let auth_service = Arc::new(AuthServiceImpl::new(users, sessions.clone()));

    let catalog = Arc::new(PlanCatalogCache::new(
        app_configs.clone(),
        PlanCatalog::default(),
    ));

    let entitlement_service = Arc::new(EntitlementServiceImpl::new(
        profile_repository.clone(),
        billing.clone(),
        catalog.clone(),
    ));
    let usage_service = Arc::new(UsageServiceImpl::new(profile_repository));
    let generation_service = Arc::new(GenerationServiceImpl::new(
        entitlement_service.clone(),
        usage_service.clone(),
        backend.clone(),
    ));
    let billing_service = Arc::new(BillingServiceImpl::new(
        billing.clone(),
        promo_codes.clone(),
        catalog,
    ));

    // Create application state
    let app_state = AppState {
        auth_service: auth_service as Arc<dyn services::auth::AuthService>,
        entitlement_service: entitlement_service
            as Arc<dyn services::entitlement::EntitlementService>,
        usage_service: usage_service as Arc<dyn services::usage::UsageService>,
        generation_service: generation_service as Arc<dyn services::generation::GenerationService>,
        billing_service: billing_service as Arc<dyn services::billing::BillingService>,
        session_repository: sessions.clone(),
        dev_login_enabled: test_config.dev_login_enabled,
    };

    // Create router. No extra CORS origins; requests without an Origin
    // header pass through the layer untouched.
    let cors_config = config::CorsConfig {
        exact_matches: vec![],
        wildcard_suffixes: vec![],
    };
    let app = create_router_with_cors(app_state, cors_config);

    TestApp {
        server: TestServer::new(app).expect("Failed to create test server"),
        profiles,
        sessions,
        app_configs,
        promo_codes,
        billing,
        backend,
    }
}

/// Helper function to get/create a user and get a session token via dev login.
pub async fn dev_login(server: &TestServer, email: &str) -> String {
    let login_request = json!({
        "email": email,
        "name": format!("Test User {}", email),
    });

    let response = server.post("/v1/auth/dev-login").json(&login_request).await;

    assert_eq!(response.status_code(), 200, "Dev login should succeed");

    let body: serde_json::Value = response.json();
    body.get("token")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .expect("Response should contain token")
}

/// GET /v1/entitlements with a bearer token and return the parsed body.
pub async fn fetch_entitlements(server: &TestServer, token: &str) -> serde_json::Value {
    let response = server
        .get("/v1/entitlements")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), 200);
    response.json()
}
