use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::UsageKind;

/// Key for the plan catalog row in `app_configs`.
pub const BILLING_PLANS_CONFIG_KEY: &str = "billing_plans";

/// Usage limits granted by a plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    pub rfq_limit: Option<i64>,
    pub proposal_limit: Option<i64>,
}

impl PlanLimits {
    /// Default entitlement for any user without an active paid subscription.
    pub fn free() -> Self {
        Self {
            rfq_limit: Some(1),
            proposal_limit: Some(1),
        }
    }

    pub fn limit_for(&self, kind: UsageKind) -> Option<i64> {
        match kind {
            UsageKind::Rfq => self.rfq_limit,
            UsageKind::Proposal => self.proposal_limit,
        }
    }
}

/// A purchasable plan: pricing used to disambiguate which plan a live
/// subscription corresponds to, plus the limits it grants.
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSpec {
    pub name: String,
    /// Monthly price in minor currency units
    pub monthly_price_cents: i64,
    /// Annual price in minor currency units
    pub annual_price_cents: i64,
    /// Stable provider price ID for the monthly price, when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_price_id: Option<String>,
    /// Stable provider price ID for the annual price, when configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_price_id: Option<String>,
    /// Max RFQ generations per billing period (absent = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfq_limit: Option<i64>,
    /// Max proposal generations per billing period (absent = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_limit: Option<i64>,
}

impl PlanSpec {
    pub fn limits(&self) -> PlanLimits {
        PlanLimits {
            rfq_limit: self.rfq_limit,
            proposal_limit: self.proposal_limit,
        }
    }

    pub fn price_cents_for(&self, annual: bool) -> i64 {
        if annual {
            self.annual_price_cents
        } else {
            self.monthly_price_cents
        }
    }
}

/// The externally configurable plan table.
///
/// Stored as JSON in `app_configs` under [`BILLING_PLANS_CONFIG_KEY`]; the
/// built-in default applies when no row is configured.
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCatalog {
    pub plans: Vec<PlanSpec>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self {
            plans: vec![
                PlanSpec {
                    name: "Premium".to_string(),
                    monthly_price_cents: 2900,
                    annual_price_cents: 29000,
                    monthly_price_id: None,
                    annual_price_id: None,
                    rfq_limit: Some(10),
                    proposal_limit: Some(10),
                },
                PlanSpec {
                    name: "Professional".to_string(),
                    monthly_price_cents: 7900,
                    annual_price_cents: 79000,
                    monthly_price_id: None,
                    annual_price_id: None,
                    rfq_limit: None,
                    proposal_limit: None,
                },
            ],
        }
    }
}

impl PlanCatalog {
    /// Parse a catalog from a JSON override (e.g. the `BILLING_PLANS` env
    /// var), falling back to the built-in default on absence or parse error.
    pub fn from_json_override(json: Option<&str>) -> Self {
        match json {
            Some(raw) => match serde_json::from_str(raw) {
                Ok(catalog) => catalog,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid plan catalog override, using default");
                    Self::default()
                }
            },
            None => Self::default(),
        }
    }

    /// Look up a plan by its canonical name (case-insensitive).
    pub fn plan(&self, name: &str) -> Option<&PlanSpec> {
        self.plans
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Resolve by stable provider price ID. The preferred path.
    pub fn resolve_by_price_id(&self, price_id: &str) -> Option<&PlanSpec> {
        self.plans.iter().find(|p| {
            p.monthly_price_id.as_deref() == Some(price_id)
                || p.annual_price_id.as_deref() == Some(price_id)
        })
    }

    /// Resolve by price amount in minor currency units (monthly or annual).
    pub fn resolve_by_amount(&self, amount_cents: i64) -> Option<&PlanSpec> {
        self.plans
            .iter()
            .find(|p| p.monthly_price_cents == amount_cents || p.annual_price_cents == amount_cents)
    }

    /// Last-resort resolution: case-insensitive substring match of the plan
    /// name against the billing product's display name.
    pub fn resolve_by_product_name(&self, product_name: &str) -> Option<&PlanSpec> {
        let haystack = product_name.to_lowercase();
        self.plans
            .iter()
            .find(|p| haystack.contains(&p.name.to_lowercase()))
    }

    /// Limits for a resolved plan name. Unknown or absent plans get the free
    /// tier so a stale name never grants more than a confirmed entitlement.
    pub fn limits_for_plan(&self, plan: Option<&str>) -> PlanLimits {
        plan.and_then(|name| self.plan(name))
            .map(|p| p.limits())
            .unwrap_or_else(PlanLimits::free)
    }
}

/// Merged view of live subscription state and persisted usage counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitlementSnapshot {
    pub subscribed: bool,
    pub plan: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub rfq_count: i64,
    pub proposal_count: i64,
    /// `None` = unlimited
    pub rfq_limit: Option<i64>,
    /// `None` = unlimited
    pub proposal_limit: Option<i64>,
}

impl EntitlementSnapshot {
    pub fn count_for(&self, kind: UsageKind) -> i64 {
        match kind {
            UsageKind::Rfq => self.rfq_count,
            UsageKind::Proposal => self.proposal_count,
        }
    }

    pub fn limit_for(&self, kind: UsageKind) -> Option<i64> {
        match kind {
            UsageKind::Rfq => self.rfq_limit,
            UsageKind::Proposal => self.proposal_limit,
        }
    }

    /// Whether one more generation of `kind` is within the entitlement.
    pub fn has_capacity(&self, kind: UsageKind) -> bool {
        match self.limit_for(kind) {
            Some(limit) => self.count_for(kind) < limit,
            None => true,
        }
    }
}

/// Repository trait for application config rows (JSON values by key)
#[async_trait]
pub trait AppConfigRepository: Send + Sync {
    /// Get a config value by key (if exists)
    async fn get_config(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;
}

/// Errors that can occur during entitlement resolution
#[derive(Debug)]
pub enum EntitlementError {
    /// Payment provider call failed; entitlement must be treated as unknown
    ProviderUnavailable(String),
    /// Database error
    DatabaseError(String),
    /// Internal error
    InternalError(String),
}

impl fmt::Display for EntitlementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderUnavailable(msg) => {
                write!(f, "Payment provider unavailable: {}", msg)
            }
            Self::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for EntitlementError {}

impl From<anyhow::Error> for EntitlementError {
    fn from(err: anyhow::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

/// Service trait for entitlement resolution
#[async_trait]
pub trait EntitlementService: Send + Sync {
    /// Resolve the caller's current entitlement against the live payment
    /// provider, persist the subscription state, and return the merged view.
    async fn resolve(
        &self,
        user_id: crate::UserId,
        email: &str,
    ) -> Result<EntitlementSnapshot, EntitlementError>;
}
