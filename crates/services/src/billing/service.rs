use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::ports::{
    BillingError, BillingInterval, BillingProvider, BillingService, CheckoutSession,
    CreateCheckoutParams, PromoCode, PromoCodeRepository,
};
use crate::entitlement::{PlanCatalog, PlanCatalogCache};
use crate::UserId;

/// Validate a checkout origin before redirect URLs are derived from it.
///
/// Only bare web origins are accepted: an `https://` host, or plain-http
/// localhost for development. Paths, queries, fragments and trailing slashes
/// are rejected.
pub fn validate_checkout_origin(origin: &str) -> Result<(), BillingError> {
    let invalid = || BillingError::InvalidOrigin(origin.to_string());

    let rest = if let Some(rest) = origin.strip_prefix("https://") {
        rest
    } else if let Some(rest) = origin.strip_prefix("http://") {
        let is_local = rest == "localhost"
            || rest == "127.0.0.1"
            || rest.starts_with("localhost:")
            || rest.starts_with("127.0.0.1:");
        if !is_local {
            return Err(invalid());
        }
        rest
    } else {
        return Err(invalid());
    };

    if rest.is_empty()
        || rest.contains('/')
        || rest.contains('?')
        || rest.contains('#')
        || rest.contains(char::is_whitespace)
    {
        return Err(invalid());
    }

    Ok(())
}

pub struct BillingServiceImpl {
    billing_provider: Arc<dyn BillingProvider>,
    promo_code_repository: Arc<dyn PromoCodeRepository>,
    catalog: Arc<PlanCatalogCache>,
}

impl BillingServiceImpl {
    pub fn new(
        billing_provider: Arc<dyn BillingProvider>,
        promo_code_repository: Arc<dyn PromoCodeRepository>,
        catalog: Arc<PlanCatalogCache>,
    ) -> Self {
        Self {
            billing_provider,
            promo_code_repository,
            catalog,
        }
    }

    /// Look up a promo code and compute its discount. Any lookup failure or
    /// invalid code continues without a discount rather than blocking the
    /// purchase.
    async fn applied_promo(&self, code: &str, price_cents: i64) -> Option<(PromoCode, i64)> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        let promo = match self.promo_code_repository.get_promo_code(code).await {
            Ok(Some(promo)) => promo,
            Ok(None) => {
                debug!("Promo code '{}' not found, continuing without discount", code);
                return None;
            }
            Err(e) => {
                warn!(
                    "Promo code lookup failed for '{}', continuing without discount: {}",
                    code, e
                );
                return None;
            }
        };

        if !promo.is_redeemable(chrono::Utc::now()) {
            debug!(
                "Promo code '{}' is inactive or expired, continuing without discount",
                code
            );
            return None;
        }

        let discount = promo.discount_cents(price_cents);
        Some((promo, discount))
    }
}

#[async_trait]
impl BillingService for BillingServiceImpl {
    async fn get_available_plans(&self) -> Result<PlanCatalog, BillingError> {
        Ok(self.catalog.get().await)
    }

    async fn create_checkout(
        &self,
        user_id: UserId,
        email: &str,
        plan_name: &str,
        interval: BillingInterval,
        promo_code: Option<&str>,
        origin: &str,
    ) -> Result<CheckoutSession, BillingError> {
        if !self.billing_provider.is_configured() {
            return Err(BillingError::NotConfigured);
        }
        validate_checkout_origin(origin)?;

        let catalog = self.catalog.get().await;
        let plan = catalog
            .plan(plan_name)
            .ok_or_else(|| BillingError::InvalidPlan(plan_name.to_string()))?;

        let price_cents = plan.price_cents_for(interval == BillingInterval::Annual);
        let applied = match promo_code {
            Some(code) => self.applied_promo(code, price_cents).await,
            None => None,
        };
        let discount_cents = applied.as_ref().map(|(_, d)| *d).unwrap_or(0);
        let amount_cents = (price_cents - discount_cents).max(0);

        // Attach to an existing billing identity when one is on record
        let customer_id = self
            .billing_provider
            .find_customer_by_email(email)
            .await
            .map_err(|e| BillingError::ProviderError(e.to_string()))?
            .map(|customer| customer.id);

        let params = CreateCheckoutParams {
            user_id,
            customer_email: email.to_string(),
            customer_id,
            plan_name: plan.name.clone(),
            interval,
            amount_cents,
            original_amount_cents: price_cents,
            discount_cents,
            promo_code: applied.map(|(promo, _)| promo.code),
            success_url: format!("{}/payment-success?session_id={{CHECKOUT_SESSION_ID}}", origin),
            cancel_url: format!("{}/pricing", origin),
        };

        let session = self
            .billing_provider
            .create_checkout_session(params)
            .await
            .map_err(|e| BillingError::ProviderError(e.to_string()))?;

        info!(
            "Checkout session created for user_id={} plan={} interval={} amount_cents={}",
            user_id, plan.name, interval, amount_cents
        );

        Ok(session)
    }
}

/// Test helpers for billing
pub mod test_helpers {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::RwLock;

    use super::*;
    use crate::billing::ports::{BillingCustomer, BillingSubscription};

    /// Configurable in-memory payment provider for tests.
    pub struct MockBillingProvider {
        configured: bool,
        failing: AtomicBool,
        customers: RwLock<HashMap<String, String>>,
        subscriptions: RwLock<HashMap<String, Vec<BillingSubscription>>>,
        checkout_calls: AtomicUsize,
        last_checkout: RwLock<Option<CreateCheckoutParams>>,
    }

    impl MockBillingProvider {
        pub fn new() -> Self {
            Self {
                configured: true,
                failing: AtomicBool::new(false),
                customers: RwLock::new(HashMap::new()),
                subscriptions: RwLock::new(HashMap::new()),
                checkout_calls: AtomicUsize::new(0),
                last_checkout: RwLock::new(None),
            }
        }

        /// A provider with no credentials configured.
        pub fn unconfigured() -> Self {
            Self {
                configured: false,
                ..Self::new()
            }
        }

        /// Make every provider call fail until reset.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub async fn add_customer(&self, email: &str, customer_id: &str) {
            self.customers
                .write()
                .await
                .insert(email.to_string(), customer_id.to_string());
        }

        pub async fn add_subscription(&self, customer_id: &str, subscription: BillingSubscription) {
            self.subscriptions
                .write()
                .await
                .entry(customer_id.to_string())
                .or_default()
                .push(subscription);
        }

        pub async fn clear_subscriptions(&self, customer_id: &str) {
            self.subscriptions.write().await.remove(customer_id);
        }

        pub fn checkout_calls(&self) -> usize {
            self.checkout_calls.load(Ordering::SeqCst)
        }

        pub async fn last_checkout(&self) -> Option<CreateCheckoutParams> {
            self.last_checkout.read().await.clone()
        }

        fn check_available(&self) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("billing provider offline");
            }
            Ok(())
        }
    }

    impl Default for MockBillingProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl BillingProvider for MockBillingProvider {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn find_customer_by_email(
            &self,
            email: &str,
        ) -> anyhow::Result<Option<BillingCustomer>> {
            self.check_available()?;
            Ok(self
                .customers
                .read()
                .await
                .get(email)
                .map(|id| BillingCustomer {
                    id: id.clone(),
                    email: Some(email.to_string()),
                }))
        }

        async fn list_active_subscriptions(
            &self,
            customer_id: &str,
        ) -> anyhow::Result<Vec<BillingSubscription>> {
            self.check_available()?;
            Ok(self
                .subscriptions
                .read()
                .await
                .get(customer_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn create_checkout_session(
            &self,
            params: CreateCheckoutParams,
        ) -> anyhow::Result<CheckoutSession> {
            self.check_available()?;
            let n = self.checkout_calls.fetch_add(1, Ordering::SeqCst) + 1;
            *self.last_checkout.write().await = Some(params);
            Ok(CheckoutSession {
                url: format!("https://checkout.test/session/{}", n),
            })
        }
    }

    /// In-memory promo code store for tests. Lookups are case-insensitive.
    #[derive(Default)]
    pub struct InMemoryPromoCodeRepository {
        codes: RwLock<HashMap<String, PromoCode>>,
    }

    impl InMemoryPromoCodeRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert(&self, promo: PromoCode) {
            self.codes
                .write()
                .await
                .insert(promo.code.to_uppercase(), promo);
        }
    }

    #[async_trait]
    impl PromoCodeRepository for InMemoryPromoCodeRepository {
        async fn get_promo_code(&self, code: &str) -> anyhow::Result<Option<PromoCode>> {
            Ok(self.codes.read().await.get(&code.to_uppercase()).cloned())
        }
    }

    /// A promo code store whose lookups always fail.
    pub struct FailingPromoCodeRepository;

    #[async_trait]
    impl PromoCodeRepository for FailingPromoCodeRepository {
        async fn get_promo_code(&self, _code: &str) -> anyhow::Result<Option<PromoCode>> {
            anyhow::bail!("promo code store unavailable")
        }
    }
}
