use crate::pool::DbPool;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use services::{
    auth::{generate_session_token, hash_session_token, SessionRepository, UserSession},
    SessionId, UserId,
};

pub struct PostgresSessionRepository {
    pool: DbPool,
    ttl_days: i64,
}

impl PostgresSessionRepository {
    pub fn new(pool: DbPool, ttl_days: i64) -> Self {
        Self { pool, ttl_days }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn create_session(&self, user_id: UserId, email: &str) -> anyhow::Result<UserSession> {
        tracing::info!("Creating session for user_id={}", user_id);

        let client = self.pool.get().await?;

        let created_at = Utc::now();
        let expires_at = created_at + Duration::days(self.ttl_days);

        // Only the hash is stored; the plaintext token leaves this function
        // exactly once, on the created session.
        let token = generate_session_token();
        let token_hash = hash_session_token(&token);

        let row = client
            .query_one(
                "INSERT INTO sessions (user_id, created_at, expires_at, token_hash)
                 VALUES ($1, $2, $3, $4)
                 RETURNING id, user_id, created_at, expires_at",
                &[&user_id, &created_at, &expires_at, &token_hash],
            )
            .await?;

        let session = UserSession {
            session_id: row.get(0),
            user_id: row.get(1),
            email: email.to_string(),
            created_at: row.get(2),
            expires_at: row.get(3),
            token: Some(token),
        };

        tracing::info!(
            "Session created: session_id={}, user_id={}, expires_at={}",
            session.session_id,
            session.user_id,
            session.expires_at
        );

        Ok(session)
    }

    async fn get_session_by_token_hash(
        &self,
        token_hash: String,
    ) -> anyhow::Result<Option<UserSession>> {
        tracing::debug!(
            "Looking up session by token_hash: {}...",
            &token_hash.chars().take(16).collect::<String>()
        );

        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT s.id, s.user_id, u.email, s.created_at, s.expires_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = $1",
                &[&token_hash],
            )
            .await?;

        let result = row.map(|r| UserSession {
            session_id: r.get(0),
            user_id: r.get(1),
            email: r.get(2),
            created_at: r.get(3),
            expires_at: r.get(4),
            token: None, // Never return the token on retrieval
        });

        if let Some(ref session) = result {
            tracing::debug!(
                "Session found: session_id={}, user_id={}",
                session.session_id,
                session.user_id
            );
        } else {
            tracing::debug!("No session found for provided token_hash");
        }

        Ok(result)
    }

    async fn delete_session(&self, session_id: SessionId) -> anyhow::Result<()> {
        tracing::info!("Deleting session: session_id={}", session_id);

        let client = self.pool.get().await?;

        let rows_affected = client
            .execute("DELETE FROM sessions WHERE id = $1", &[&session_id])
            .await?;

        if rows_affected > 0 {
            tracing::info!("Session deleted: session_id={}", session_id);
        } else {
            tracing::warn!("No session found to delete: session_id={}", session_id);
        }

        Ok(())
    }
}
