use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::UserId;

/// Billing identity as known to the payment provider.
#[derive(Debug, Clone)]
pub struct BillingCustomer {
    pub id: String,
    pub email: Option<String>,
}

/// An active subscription as reported by the payment provider, reduced to the
/// fields plan resolution needs.
#[derive(Debug, Clone)]
pub struct BillingSubscription {
    pub id: String,
    /// Stable price identifier of the subscription's first line item.
    pub price_id: String,
    /// Recurring amount in minor currency units, when the provider reports one.
    pub unit_amount: Option<i64>,
    /// Display name of the billed product, when expanded by the provider.
    pub product_name: Option<String>,
    pub current_period_end: DateTime<Utc>,
}

/// Billing interval selected at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Annual,
}

impl BillingInterval {
    pub fn from_is_annual(is_annual: bool) -> Self {
        if is_annual {
            Self::Annual
        } else {
            Self::Monthly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Promo discount kinds: percentage off the plan price, or a fixed amount in
/// whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// A promo code row.
#[derive(Debug, Clone)]
pub struct PromoCode {
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent (0..=100) for `Percentage`, whole currency units for `Fixed`.
    pub discount_value: i64,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PromoCode {
    /// Discount in minor currency units for a given plan price.
    ///
    /// Percentage discounts round half-up; fixed discounts convert whole
    /// units to minor units. Never exceeds the price itself.
    pub fn discount_cents(&self, price_cents: i64) -> i64 {
        let raw = match self.discount_type {
            DiscountType::Percentage => (price_cents * self.discount_value + 50) / 100,
            DiscountType::Fixed => self.discount_value * 100,
        };
        raw.min(price_cents).max(0)
    }

    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// Repository trait for promo codes
#[async_trait]
pub trait PromoCodeRepository: Send + Sync {
    /// Look up a promo code by its (case-insensitive) code.
    async fn get_promo_code(&self, code: &str) -> anyhow::Result<Option<PromoCode>>;
}

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutParams {
    pub user_id: UserId,
    pub customer_email: String,
    /// Existing billing identity to attach the session to, when one is known.
    pub customer_id: Option<String>,
    pub plan_name: String,
    pub interval: BillingInterval,
    /// Final amount to charge in minor currency units, after any discount.
    pub amount_cents: i64,
    /// Undiscounted plan price in minor currency units.
    pub original_amount_cents: i64,
    pub discount_cents: i64,
    pub promo_code: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A created checkout session.
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
}

/// Port to the payment provider. The core treats billing as a black box that
/// can look up customers by email, list their active subscriptions, and mint
/// checkout sessions.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Whether provider credentials are configured at all.
    fn is_configured(&self) -> bool;

    /// Find the billing identity for an account email.
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> anyhow::Result<Option<BillingCustomer>>;

    /// List active subscriptions for a customer, with price/product metadata.
    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> anyhow::Result<Vec<BillingSubscription>>;

    /// Create a hosted checkout session and return its URL.
    async fn create_checkout_session(
        &self,
        params: CreateCheckoutParams,
    ) -> anyhow::Result<CheckoutSession>;
}

/// Error types for billing operations
#[derive(Debug)]
pub enum BillingError {
    /// Payment provider credentials are not configured
    NotConfigured,
    /// Unknown plan name requested
    InvalidPlan(String),
    /// Unsupported billing interval requested
    InvalidInterval(String),
    /// Checkout origin failed validation
    InvalidOrigin(String),
    /// Payment provider call failed
    ProviderError(String),
    /// Database error
    DatabaseError(String),
    /// Internal error
    InternalError(String),
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "Payment provider is not configured"),
            Self::InvalidPlan(plan) => write!(f, "Invalid plan: {}", plan),
            Self::InvalidInterval(interval) => write!(f, "Invalid billing interval: {}", interval),
            Self::InvalidOrigin(origin) => write!(f, "Invalid checkout origin: {}", origin),
            Self::ProviderError(msg) => write!(f, "Payment provider error: {}", msg),
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for BillingError {}

impl From<anyhow::Error> for BillingError {
    fn from(err: anyhow::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

/// Service trait for billing flows
#[async_trait]
pub trait BillingService: Send + Sync {
    /// Get the purchasable plan catalog.
    async fn get_available_plans(&self)
        -> Result<crate::entitlement::PlanCatalog, BillingError>;

    /// Create a checkout session for a plan purchase.
    ///
    /// `origin` is the caller's web origin; redirect URLs are derived from it
    /// after validation.
    async fn create_checkout(
        &self,
        user_id: UserId,
        email: &str,
        plan_name: &str,
        interval: BillingInterval,
        promo_code: Option<&str>,
        origin: &str,
    ) -> Result<CheckoutSession, BillingError>;
}
