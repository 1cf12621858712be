use crate::pool::DbPool;
use async_trait::async_trait;
use services::{
    auth::{User, UserRepository},
    UserId,
};

pub struct PostgresUserRepository {
    pool: DbPool,
}

impl PostgresUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get_or_create_user(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> anyhow::Result<User> {
        let client = self.pool.get().await?;

        // The no-op DO UPDATE makes the insert return the existing row, so
        // concurrent first logins for the same email converge on one user.
        let row = client
            .query_one(
                "INSERT INTO users (email, name)
                 VALUES ($1, $2)
                 ON CONFLICT (email)
                 DO UPDATE SET updated_at = now()
                 RETURNING id, email, name, created_at, updated_at",
                &[&email, &name],
            )
            .await?;

        Ok(User {
            id: row.get(0),
            email: row.get(1),
            name: row.get(2),
            created_at: row.get(3),
            updated_at: row.get(4),
        })
    }

    async fn get_user(&self, user_id: UserId) -> anyhow::Result<Option<User>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, email, name, created_at, updated_at
                 FROM users
                 WHERE id = $1",
                &[&user_id],
            )
            .await?;

        Ok(row.map(|r| User {
            id: r.get(0),
            email: r.get(1),
            name: r.get(2),
            created_at: r.get(3),
            updated_at: r.get(4),
        }))
    }
}
