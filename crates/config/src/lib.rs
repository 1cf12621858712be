use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
    pub tls_enabled: bool,
    pub tls_ca_cert_path: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("DATABASE_HOST").ok(),
            port: std::env::var("DATABASE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5432),
            database: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "rfqrocket".to_string()),
            username: std::env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: if let Ok(path) = std::env::var("DATABASE_PASSWORD_FILE") {
                std::fs::read_to_string(&path)
                    .map(|p| p.trim().to_string())
                    .unwrap_or_else(|e| {
                        panic!("Failed to read DATABASE_PASSWORD_FILE at {}: {}", path, e)
                    })
            } else {
                std::env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "postgres".to_string())
            },
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
            tls_enabled: std::env::var("DATABASE_TLS_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            tls_ca_cert_path: std::env::var("DATABASE_TLS_CA_CERT_PATH").ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
        }
    }
}

/// Stripe payment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Stripe secret key for API authentication
    pub secret_key: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: if let Ok(path) = std::env::var("STRIPE_SECRET_KEY_FILE") {
                std::fs::read_to_string(&path)
                    .map(|p| p.trim().to_string())
                    .unwrap_or_else(|e| {
                        panic!("Failed to read STRIPE_SECRET_KEY_FILE at {}: {}", path, e)
                    })
            } else {
                std::env::var("STRIPE_SECRET_KEY").unwrap_or_default()
            },
        }
    }
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        !self.secret_key.is_empty()
    }
}

/// Configuration for the document-generation backend (OpenAI-compatible API).
#[derive(Clone, Deserialize)]
pub struct GenerationConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    /// Model used to turn extracted solicitation text into an RFQ letter.
    pub rfq_model: String,
    /// Model used to turn merged RFQ + solicitation text into a proposal.
    pub proposal_model: String,
    pub rfq_max_tokens: u32,
    pub proposal_max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: if let Ok(path) = std::env::var("OPENAI_API_KEY_FILE") {
                std::fs::read_to_string(&path)
                    .map(|p| p.trim().to_string())
                    .unwrap_or_else(|e| {
                        panic!("Failed to read OPENAI_API_KEY_FILE at {}: {}", path, e)
                    })
            } else {
                std::env::var("OPENAI_API_KEY").unwrap_or_default()
            },
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
            rfq_model: std::env::var("GENERATION_RFQ_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            proposal_model: std::env::var("GENERATION_PROPOSAL_MODEL")
                .unwrap_or_else(|_| "gpt-4o".to_string()),
            rfq_max_tokens: std::env::var("GENERATION_RFQ_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            proposal_max_tokens: std::env::var("GENERATION_PROPOSAL_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            temperature: std::env::var("GENERATION_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.3),
            request_timeout_secs: std::env::var("GENERATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        }
    }
}

// Manual Debug so the API key never ends up in logs.
impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("rfq_model", &self.rfq_model)
            .field("proposal_model", &self.proposal_model)
            .field("rfq_max_tokens", &self.rfq_max_tokens)
            .field("proposal_max_tokens", &self.proposal_max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a session token in days.
    pub session_ttl_days: i64,
    /// When true, POST /v1/auth/dev-login mints sessions without an identity
    /// provider. Never enable outside local development and tests.
    pub dev_login_enabled: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_days: std::env::var("AUTH_SESSION_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            dev_login_enabled: std::env::var("AUTH_DEV_LOGIN_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

/// Billing configuration.
///
/// The plan catalog itself (names, prices, price IDs, usage limits) lives in
/// the `app_configs` table under the `billing_plans` key so it can change
/// without a deploy. `plans_json` is an env override used when the table has
/// no row yet.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    pub plans_json: Option<String>,
    /// Checkout idempotency keys are stable within this window, so a
    /// double-clicked upgrade button reuses the same Stripe session.
    pub checkout_idempotency_window_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            plans_json: std::env::var("BILLING_PLANS").ok(),
            checkout_idempotency_window_secs: std::env::var(
                "BILLING_CHECKOUT_IDEMPOTENCY_WINDOW_SECS",
            )
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub exact_matches: Vec<String>,
    pub wildcard_suffixes: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let raw_origins = std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| {
            "http://localhost:3000,https://rfqrocket.com,*.rfqrocket.com".to_string()
        });

        let mut exact_matches = Vec::new();
        let mut wildcard_suffixes = Vec::new();

        for origin in raw_origins.split(',') {
            let s = origin.trim();
            if s.is_empty() {
                continue;
            }

            if let Some(suffix) = s.strip_prefix('*') {
                let safe_suffix = if suffix.starts_with('.') || suffix.starts_with('-') {
                    suffix.to_string()
                } else {
                    format!(".{}", suffix)
                };
                wildcard_suffixes.push(safe_suffix);
            } else {
                exact_matches.push(s.to_string());
            }
        }

        Self {
            exact_matches,
            wildcard_suffixes,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoggingConfig {
    /// Global log level for the application.
    ///
    /// Valid values: "error", "warn", "info", "debug", "trace".
    /// Default: "info" (from LOG_LEVEL env var or fallback).
    pub level: String,
    /// Log output format.
    ///
    /// Valid values: "pretty", "json".
    /// Default: "pretty" (from LOG_FORMAT env var or fallback).
    pub format: String,
    /// Per-module log levels.
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("api".to_string(), "debug".to_string());
        modules.insert("services".to_string(), "debug".to_string());
        modules.insert("database".to_string(), "debug".to_string());

        if let Ok(level) = std::env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = std::env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = std::env::var("LOG_MODULE_DATABASE") {
            modules.insert("database".to_string(), level);
        }

        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        }
    }
}

impl LoggingConfig {
    /// Render the config as an `EnvFilter` directive string, e.g.
    /// `info,api=debug,database=debug,services=debug`.
    pub fn env_filter_directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            directives.push(format!("{}={}", module, level));
        }
        directives.join(",")
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Stripe payment configuration
    pub stripe: StripeConfig,
    pub generation: GenerationConfig,
    pub auth: AuthConfig,
    pub billing: BillingConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            stripe: StripeConfig::default(),
            generation: GenerationConfig::default(),
            auth: AuthConfig::default(),
            billing: BillingConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cors_config_parsing_exact_matches() {
        std::env::set_var(
            "CORS_ALLOWED_ORIGINS",
            "https://example.com,http://test.com",
        );
        let config = CorsConfig::default();
        assert!(config
            .exact_matches
            .contains(&"https://example.com".to_string()));
        assert!(config
            .exact_matches
            .contains(&"http://test.com".to_string()));
        assert!(config.wildcard_suffixes.is_empty());
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_cors_config_parsing_wildcard_with_dot() {
        std::env::set_var("CORS_ALLOWED_ORIGINS", "*.rfqrocket.com");
        let config = CorsConfig::default();
        assert_eq!(config.wildcard_suffixes, vec![".rfqrocket.com"]);
        assert!(config.exact_matches.is_empty());
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_cors_config_parsing_wildcard_without_dot() {
        std::env::set_var("CORS_ALLOWED_ORIGINS", "*rfqrocket.com");
        let config = CorsConfig::default();
        assert_eq!(config.wildcard_suffixes, vec![".rfqrocket.com"]);
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_cors_config_parsing_mixed() {
        std::env::set_var(
            "CORS_ALLOWED_ORIGINS",
            "http://localhost:3000, https://rfqrocket.com ,*.staging.rfqrocket.com",
        );
        let config = CorsConfig::default();
        assert_eq!(
            config.exact_matches,
            vec![
                "http://localhost:3000".to_string(),
                "https://rfqrocket.com".to_string()
            ]
        );
        assert_eq!(config.wildcard_suffixes, vec![".staging.rfqrocket.com"]);
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_cors_config_parsing_empty_entries() {
        std::env::set_var("CORS_ALLOWED_ORIGINS", ",,http://localhost:3000,,");
        let config = CorsConfig::default();
        assert_eq!(config.exact_matches, vec!["http://localhost:3000"]);
        assert!(config.wildcard_suffixes.is_empty());
        std::env::remove_var("CORS_ALLOWED_ORIGINS");
    }

    #[test]
    #[serial]
    fn test_auth_config_defaults() {
        std::env::remove_var("AUTH_SESSION_TTL_DAYS");
        std::env::remove_var("AUTH_DEV_LOGIN_ENABLED");
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl_days, 30);
        assert!(!config.dev_login_enabled);
    }

    #[test]
    #[serial]
    fn test_auth_config_dev_login_flag() {
        std::env::set_var("AUTH_DEV_LOGIN_ENABLED", "true");
        let config = AuthConfig::default();
        assert!(config.dev_login_enabled);
        std::env::remove_var("AUTH_DEV_LOGIN_ENABLED");
    }

    #[test]
    #[serial]
    fn test_generation_config_debug_redacts_api_key() {
        std::env::set_var("OPENAI_API_KEY", "sk-super-secret");
        let config = GenerationConfig::default();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("[REDACTED]"));
        std::env::remove_var("OPENAI_API_KEY");
    }

    #[test]
    #[serial]
    fn test_logging_config_filter_directives() {
        std::env::remove_var("LOG_LEVEL");
        std::env::remove_var("LOG_MODULE_API");
        std::env::remove_var("LOG_MODULE_SERVICES");
        std::env::remove_var("LOG_MODULE_DATABASE");
        let config = LoggingConfig::default();
        assert_eq!(
            config.env_filter_directives(),
            "info,api=debug,database=debug,services=debug"
        );
    }
}
