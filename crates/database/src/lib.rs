pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};

use anyhow::Result;

/// Database handle owning the connection pool.
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Wrap an existing connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connect using application configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
