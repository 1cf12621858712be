use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::UserId;

/// Per-user usage and subscription record, one row per authenticated account.
///
/// Created lazily on the first authenticated entitlement check (or first
/// usage increment) rather than at signup, so accounts that never touch the
/// generator never get a row.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub business_name: Option<String>,
    pub rfq_count: i64,
    pub proposal_count: i64,
    pub subscription_active: bool,
    pub subscription_plan: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub promo_code_used: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Current counter value for a usage kind.
    pub fn count_for(&self, kind: UsageKind) -> i64 {
        match kind {
            UsageKind::Rfq => self.rfq_count,
            UsageKind::Proposal => self.proposal_count,
        }
    }
}

/// The two metered generation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageKind {
    Rfq,
    Proposal,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Rfq => "rfq",
            UsageKind::Proposal => "proposal",
        }
    }

    /// Profile column holding the counter for this kind.
    pub fn column(&self) -> &'static str {
        match self {
            UsageKind::Rfq => "rfq_count",
            UsageKind::Proposal => "proposal_count",
        }
    }

    /// Parse the wire value. Only the exact strings "rfq" and "proposal" are
    /// accepted; anything else is a client error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rfq" => Some(UsageKind::Rfq),
            "proposal" => Some(UsageKind::Proposal),
            _ => None,
        }
    }
}

impl std::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription fields resolved from the billing provider, persisted back to
/// the profile. Never carries counters: persisting this must not touch them.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    pub active: bool,
    pub plan: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    pub fn unsubscribed() -> Self {
        Self {
            active: false,
            plan: None,
            subscription_end: None,
        }
    }
}

/// Repository trait for the per-user profile record
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Get a profile by user ID
    async fn get_profile(&self, user_id: UserId) -> anyhow::Result<Option<UserProfile>>;

    /// Get a profile, creating it with zero counts if absent. Concurrent
    /// callers for the same user must converge on a single row.
    async fn get_or_create_profile(
        &self,
        user_id: UserId,
        email: &str,
    ) -> anyhow::Result<UserProfile>;

    /// Atomically add 1 to the counter for `kind` and return the new value.
    ///
    /// This must be a single data-store-level increment, never a
    /// read-modify-write in the caller: two concurrent increments for the
    /// same user must both be reflected in the final count. Creates the
    /// profile row (with the incremented counter at 1) when it does not
    /// exist yet.
    async fn increment_usage(
        &self,
        user_id: UserId,
        email: &str,
        kind: UsageKind,
    ) -> anyhow::Result<i64>;

    /// Persist resolved subscription fields without changing the counters.
    async fn update_subscription_state(
        &self,
        user_id: UserId,
        state: &SubscriptionState,
    ) -> anyhow::Result<()>;
}
