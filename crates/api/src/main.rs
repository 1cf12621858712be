use api::{create_router_with_cors, ApiDoc, AppState};
use database::repositories::{
    PostgresAppConfigRepository, PostgresProfileRepository, PostgresPromoCodeRepository,
    PostgresSessionRepository, PostgresUserRepository,
};
use services::{
    auth::AuthServiceImpl,
    billing::{BillingServiceImpl, StripeBillingProvider},
    entitlement::{EntitlementServiceImpl, PlanCatalog, PlanCatalogCache},
    generation::{GenerationServiceImpl, OpenAiBackend},
    usage::UsageServiceImpl,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
        eprintln!("Continuing with environment variables...");
    }

    // Load configuration from environment
    let config = config::Config::from_env();

    // Initialize tracing. RUST_LOG takes precedence over the logging config.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.env_filter_directives().into());
    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting API server...");

    tracing::info!(
        "Database: {}:{}/{}",
        config.database.host.as_deref().unwrap_or("localhost"),
        config.database.port,
        config.database.database
    );
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);

    // Create database and run migrations
    tracing::info!("Connecting to database...");
    let db = database::Database::from_config(&config.database).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    // Create repositories
    let pool = db.pool().clone();
    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let session_repo = Arc::new(PostgresSessionRepository::new(
        pool.clone(),
        config.auth.session_ttl_days,
    ));
    let profile_repo = Arc::new(PostgresProfileRepository::new(pool.clone()));
    let app_config_repo = Arc::new(PostgresAppConfigRepository::new(pool.clone()));
    let promo_code_repo = Arc::new(PostgresPromoCodeRepository::new(pool));

    // Create services
    tracing::info!("Initializing services...");
    let auth_service = Arc::new(AuthServiceImpl::new(user_repo, session_repo.clone()));

    let catalog_cache = Arc::new(PlanCatalogCache::new(
        app_config_repo,
        PlanCatalog::from_json_override(config.billing.plans_json.as_deref()),
    ));

    if !config.stripe.is_configured() {
        tracing::warn!(
            "STRIPE_SECRET_KEY is not set; all users will resolve to the free tier and checkout is disabled"
        );
    }
    let billing_provider = Arc::new(StripeBillingProvider::new(
        config.stripe.secret_key.clone(),
        config.billing.checkout_idempotency_window_secs,
    ));

    let entitlement_service = Arc::new(EntitlementServiceImpl::new(
        profile_repo.clone(),
        billing_provider.clone(),
        catalog_cache.clone(),
    ));
    let usage_service = Arc::new(UsageServiceImpl::new(profile_repo));

    let generation_backend = Arc::new(OpenAiBackend::new(config.generation.clone())?);
    let generation_service = Arc::new(GenerationServiceImpl::new(
        entitlement_service.clone(),
        usage_service.clone(),
        generation_backend,
    ));

    let billing_service = Arc::new(BillingServiceImpl::new(
        billing_provider,
        promo_code_repo,
        catalog_cache,
    ));

    if config.auth.dev_login_enabled {
        tracing::warn!("Dev login is ENABLED; never run this configuration in production");
    }

    // Create application state
    let app_state = AppState {
        auth_service: auth_service as Arc<dyn services::auth::AuthService>,
        entitlement_service: entitlement_service
            as Arc<dyn services::entitlement::EntitlementService>,
        usage_service: usage_service as Arc<dyn services::usage::UsageService>,
        generation_service: generation_service as Arc<dyn services::generation::GenerationService>,
        billing_service: billing_service as Arc<dyn services::billing::BillingService>,
        session_repository: session_repo,
        dev_login_enabled: config.auth.dev_login_enabled,
    };

    // Create router
    let app = create_router_with_cors(app_state, config.cors.clone())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("📚 Swagger UI available at http://{}/docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
