use crate::pool::DbPool;
use async_trait::async_trait;
use services::entitlement::AppConfigRepository;

pub struct PostgresAppConfigRepository {
    pool: DbPool,
}

impl PostgresAppConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppConfigRepository for PostgresAppConfigRepository {
    async fn get_config(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        tracing::debug!("Fetching app config for key={}", key);

        let client = self.pool.get().await?;

        let row = client
            .query_opt("SELECT value FROM app_configs WHERE key = $1", &[&key])
            .await?;

        Ok(row.map(|r| r.get("value")))
    }
}
