use crate::pool::DbPool;
use async_trait::async_trait;
use services::{
    profile::{ProfileRepository, SubscriptionState, UsageKind, UserProfile},
    UserId,
};

const PROFILE_COLUMNS: &str = "id, email, business_name, rfq_count, proposal_count, \
     subscription_active, subscription_plan, subscription_end, promo_code_used, \
     created_at, updated_at";

pub struct PostgresProfileRepository {
    pool: DbPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_profile(row: &tokio_postgres::Row) -> UserProfile {
        UserProfile {
            id: row.get(0),
            email: row.get(1),
            business_name: row.get(2),
            rfq_count: row.get(3),
            proposal_count: row.get(4),
            subscription_active: row.get(5),
            subscription_plan: row.get(6),
            subscription_end: row.get(7),
            promo_code_used: row.get(8),
            created_at: row.get(9),
            updated_at: row.get(10),
        }
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn get_profile(&self, user_id: UserId) -> anyhow::Result<Option<UserProfile>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM user_profiles WHERE id = $1",
                    PROFILE_COLUMNS
                ),
                &[&user_id],
            )
            .await?;

        Ok(row.as_ref().map(Self::row_to_profile))
    }

    async fn get_or_create_profile(
        &self,
        user_id: UserId,
        email: &str,
    ) -> anyhow::Result<UserProfile> {
        let client = self.pool.get().await?;

        // DO NOTHING returns no row on conflict, so read back afterwards.
        // Concurrent first calls for the same user all land on one row.
        client
            .execute(
                "INSERT INTO user_profiles (id, email)
                 VALUES ($1, $2)
                 ON CONFLICT (id) DO NOTHING",
                &[&user_id, &email],
            )
            .await?;

        let row = client
            .query_one(
                &format!(
                    "SELECT {} FROM user_profiles WHERE id = $1",
                    PROFILE_COLUMNS
                ),
                &[&user_id],
            )
            .await?;

        Ok(Self::row_to_profile(&row))
    }

    async fn increment_usage(
        &self,
        user_id: UserId,
        email: &str,
        kind: UsageKind,
    ) -> anyhow::Result<i64> {
        let client = self.pool.get().await?;

        // Single-statement upsert so two concurrent increments for the same
        // user are both counted. `column()` is one of two fixed identifiers,
        // never caller input.
        let column = kind.column();
        let sql = format!(
            "INSERT INTO user_profiles (id, email, {column})
             VALUES ($1, $2, 1)
             ON CONFLICT (id)
             DO UPDATE SET {column} = user_profiles.{column} + 1, updated_at = now()
             RETURNING {column}"
        );

        let row = client.query_one(&sql, &[&user_id, &email]).await?;
        let new_count: i64 = row.get(0);

        tracing::debug!(
            "Incremented {} for user_id={} to {}",
            column,
            user_id,
            new_count
        );

        Ok(new_count)
    }

    async fn update_subscription_state(
        &self,
        user_id: UserId,
        state: &SubscriptionState,
    ) -> anyhow::Result<()> {
        let client = self.pool.get().await?;

        // Counters are deliberately absent from this statement.
        let rows_affected = client
            .execute(
                "UPDATE user_profiles
                 SET subscription_active = $2,
                     subscription_plan = $3,
                     subscription_end = $4,
                     updated_at = now()
                 WHERE id = $1",
                &[&user_id, &state.active, &state.plan, &state.subscription_end],
            )
            .await?;

        if rows_affected == 0 {
            tracing::warn!(
                "No profile row to update subscription state for user_id={}",
                user_id
            );
        }

        Ok(())
    }
}
