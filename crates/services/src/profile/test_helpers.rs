//! In-memory profile repository for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::ports::{ProfileRepository, SubscriptionState, UsageKind, UserProfile};
use crate::types::UserId;

/// In-memory `ProfileRepository`. Mutations take a write lock, so the
/// increment is atomic the same way the SQL single-statement increment is.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    rows: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a profile row directly, bypassing the lazy-creation path.
    pub async fn insert(&self, profile: UserProfile) {
        self.rows.write().await.insert(profile.id, profile);
    }

    /// Snapshot of the stored row, if any.
    pub async fn stored(&self, user_id: UserId) -> Option<UserProfile> {
        self.rows.read().await.get(&user_id).cloned()
    }
}

fn new_profile(user_id: UserId, email: &str) -> UserProfile {
    let now = Utc::now();
    UserProfile {
        id: user_id,
        email: email.to_string(),
        business_name: None,
        rfq_count: 0,
        proposal_count: 0,
        subscription_active: false,
        subscription_plan: None,
        subscription_end: None,
        promo_code_used: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get_profile(&self, user_id: UserId) -> anyhow::Result<Option<UserProfile>> {
        Ok(self.rows.read().await.get(&user_id).cloned())
    }

    async fn get_or_create_profile(
        &self,
        user_id: UserId,
        email: &str,
    ) -> anyhow::Result<UserProfile> {
        let mut rows = self.rows.write().await;
        let profile = rows
            .entry(user_id)
            .or_insert_with(|| new_profile(user_id, email));
        Ok(profile.clone())
    }

    async fn increment_usage(
        &self,
        user_id: UserId,
        email: &str,
        kind: UsageKind,
    ) -> anyhow::Result<i64> {
        let mut rows = self.rows.write().await;
        let profile = rows
            .entry(user_id)
            .or_insert_with(|| new_profile(user_id, email));
        let count = match kind {
            UsageKind::Rfq => {
                profile.rfq_count += 1;
                profile.rfq_count
            }
            UsageKind::Proposal => {
                profile.proposal_count += 1;
                profile.proposal_count
            }
        };
        profile.updated_at = Utc::now();
        Ok(count)
    }

    async fn update_subscription_state(
        &self,
        user_id: UserId,
        state: &SubscriptionState,
    ) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;
        let Some(profile) = rows.get_mut(&user_id) else {
            anyhow::bail!("profile not found for user_id={}", user_id);
        };
        profile.subscription_active = state.active;
        profile.subscription_plan = state.plan.clone();
        profile.subscription_end = state.subscription_end;
        profile.updated_at = Utc::now();
        Ok(())
    }
}

/// A profile repository whose mutations always fail, for exercising the
/// reservation-failure path.
pub struct FailingProfileRepository;

#[async_trait]
impl ProfileRepository for FailingProfileRepository {
    async fn get_profile(&self, _user_id: UserId) -> anyhow::Result<Option<UserProfile>> {
        anyhow::bail!("profile store unavailable")
    }

    async fn get_or_create_profile(
        &self,
        _user_id: UserId,
        _email: &str,
    ) -> anyhow::Result<UserProfile> {
        anyhow::bail!("profile store unavailable")
    }

    async fn increment_usage(
        &self,
        _user_id: UserId,
        _email: &str,
        _kind: UsageKind,
    ) -> anyhow::Result<i64> {
        anyhow::bail!("profile store unavailable")
    }

    async fn update_subscription_state(
        &self,
        _user_id: UserId,
        _state: &SubscriptionState,
    ) -> anyhow::Result<()> {
        anyhow::bail!("profile store unavailable")
    }
}
