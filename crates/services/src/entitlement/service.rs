use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::ports::{
    AppConfigRepository, EntitlementError, EntitlementService, EntitlementSnapshot, PlanCatalog,
    BILLING_PLANS_CONFIG_KEY,
};
use crate::billing::ports::BillingProvider;
use crate::profile::{ProfileRepository, SubscriptionState};
use crate::UserId;

/// Loaded catalog goes stale after this long and is re-read from config.
const CATALOG_CACHE_TTL_SECS: u64 = 600; // 10 minutes

struct CachedCatalog {
    catalog: PlanCatalog,
    cached_at: Instant,
}

/// TTL-cached view of the configured plan catalog.
///
/// Shared between entitlement resolution and checkout so both price the same
/// table. Falls back to the construction-time default when no config row
/// exists or the read fails.
pub struct PlanCatalogCache {
    app_configs: Arc<dyn AppConfigRepository>,
    default_catalog: PlanCatalog,
    cache: RwLock<Option<CachedCatalog>>,
}

impl PlanCatalogCache {
    pub fn new(app_configs: Arc<dyn AppConfigRepository>, default_catalog: PlanCatalog) -> Self {
        Self {
            app_configs,
            default_catalog,
            cache: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> PlanCatalog {
        {
            let guard = self.cache.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.cached_at.elapsed().as_secs() < CATALOG_CACHE_TTL_SECS {
                    return cached.catalog.clone();
                }
            }
        }

        let catalog = match self.app_configs.get_config(BILLING_PLANS_CONFIG_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<PlanCatalog>(value) {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!(
                        "Invalid '{}' config row, using default catalog: {}",
                        BILLING_PLANS_CONFIG_KEY, e
                    );
                    self.default_catalog.clone()
                }
            },
            Ok(None) => self.default_catalog.clone(),
            Err(e) => {
                // Served without caching so the next call retries the read
                warn!("Failed to load plan catalog, using default: {}", e);
                return self.default_catalog.clone();
            }
        };

        let mut guard = self.cache.write().await;
        *guard = Some(CachedCatalog {
            catalog: catalog.clone(),
            cached_at: Instant::now(),
        });
        catalog
    }
}

pub struct EntitlementServiceImpl {
    profile_repository: Arc<dyn ProfileRepository>,
    billing_provider: Arc<dyn BillingProvider>,
    catalog: Arc<PlanCatalogCache>,
}

impl EntitlementServiceImpl {
    pub fn new(
        profile_repository: Arc<dyn ProfileRepository>,
        billing_provider: Arc<dyn BillingProvider>,
        catalog: Arc<PlanCatalogCache>,
    ) -> Self {
        Self {
            profile_repository,
            billing_provider,
            catalog,
        }
    }

    /// Query the payment provider for the caller's live subscription state.
    async fn resolve_subscription_state(
        &self,
        user_id: UserId,
        email: &str,
        catalog: &PlanCatalog,
    ) -> Result<SubscriptionState, EntitlementError> {
        let customer = self
            .billing_provider
            .find_customer_by_email(email)
            .await
            .map_err(|e| EntitlementError::ProviderUnavailable(e.to_string()))?;

        let Some(customer) = customer else {
            debug!("No billing identity for user_id={}", user_id);
            return Ok(SubscriptionState::unsubscribed());
        };

        let subscriptions = self
            .billing_provider
            .list_active_subscriptions(&customer.id)
            .await
            .map_err(|e| EntitlementError::ProviderUnavailable(e.to_string()))?;

        let Some(subscription) = subscriptions.first() else {
            debug!(
                "Billing identity {} has no active subscriptions (user_id={})",
                customer.id, user_id
            );
            return Ok(SubscriptionState::unsubscribed());
        };

        let plan = catalog
            .resolve_by_price_id(&subscription.price_id)
            .or_else(|| {
                subscription
                    .unit_amount
                    .and_then(|cents| catalog.resolve_by_amount(cents))
            })
            .or_else(|| {
                let name = subscription.product_name.as_deref()?;
                let matched = catalog.resolve_by_product_name(name);
                if matched.is_some() {
                    warn!(
                        "Resolved plan for subscription {} by product display name '{}'; \
                         configure a price ID for a stable match",
                        subscription.id, name
                    );
                }
                matched
            });

        if plan.is_none() {
            warn!(
                "Active subscription {} (price {}) matched no catalog plan, granting free-tier limits",
                subscription.id, subscription.price_id
            );
        }

        Ok(SubscriptionState {
            active: true,
            plan: plan.map(|p| p.name.clone()),
            subscription_end: Some(subscription.current_period_end),
        })
    }
}

#[async_trait]
impl EntitlementService for EntitlementServiceImpl {
    async fn resolve(
        &self,
        user_id: UserId,
        email: &str,
    ) -> Result<EntitlementSnapshot, EntitlementError> {
        let catalog = self.catalog.get().await;

        let state = if self.billing_provider.is_configured() {
            self.resolve_subscription_state(user_id, email, &catalog)
                .await?
        } else {
            debug!(
                "Billing provider not configured, treating user_id={} as unsubscribed",
                user_id
            );
            SubscriptionState::unsubscribed()
        };

        // Row is created lazily with zero counts; the state write never
        // touches the counters.
        let profile = self
            .profile_repository
            .get_or_create_profile(user_id, email)
            .await
            .map_err(|e| EntitlementError::DatabaseError(e.to_string()))?;
        self.profile_repository
            .update_subscription_state(user_id, &state)
            .await
            .map_err(|e| EntitlementError::DatabaseError(e.to_string()))?;

        let limits = if state.active {
            catalog.limits_for_plan(state.plan.as_deref())
        } else {
            catalog.limits_for_plan(None)
        };

        debug!(
            "Entitlement resolved for user_id={}: subscribed={} plan={:?} rfq={}/{:?} proposal={}/{:?}",
            user_id,
            state.active,
            state.plan,
            profile.rfq_count,
            limits.rfq_limit,
            profile.proposal_count,
            limits.proposal_limit
        );

        Ok(EntitlementSnapshot {
            subscribed: state.active,
            plan: state.plan,
            subscription_end: state.subscription_end,
            rfq_count: profile.rfq_count,
            proposal_count: profile.proposal_count,
            rfq_limit: limits.rfq_limit,
            proposal_limit: limits.proposal_limit,
        })
    }
}

/// Test helpers for entitlement resolution
pub mod test_helpers {
    use std::collections::HashMap;

    use super::*;

    /// In-memory app config store for tests.
    #[derive(Default)]
    pub struct InMemoryAppConfigRepository {
        configs: RwLock<HashMap<String, serde_json::Value>>,
    }

    impl InMemoryAppConfigRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn set(&self, key: &str, value: serde_json::Value) {
            self.configs.write().await.insert(key.to_string(), value);
        }
    }

    #[async_trait]
    impl AppConfigRepository for InMemoryAppConfigRepository {
        async fn get_config(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
            Ok(self.configs.read().await.get(key).cloned())
        }
    }
}
