use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::pool::DbPool;

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "init",
    sql: include_str!("../migrations/0001_init.sql"),
}];

/// Apply all pending migrations.
///
/// Each migration runs in its own transaction and is recorded in
/// `schema_migrations`, so a restart re-applies nothing that already
/// committed.
pub async fn run(pool: &DbPool) -> Result<()> {
    let mut client = pool
        .get()
        .await
        .context("Failed to get connection for migrations")?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                 version INT PRIMARY KEY,
                 name TEXT NOT NULL,
                 applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
            &[],
        )
        .await
        .context("Failed to create schema_migrations table")?;

    for migration in MIGRATIONS {
        let applied = client
            .query_opt(
                "SELECT version FROM schema_migrations WHERE version = $1",
                &[&migration.version],
            )
            .await?
            .is_some();

        if applied {
            debug!(
                "Migration {} ({}) already applied",
                migration.version, migration.name
            );
            continue;
        }

        info!("Applying migration {} ({})", migration.version, migration.name);

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await.with_context(|| {
            format!(
                "Migration {} ({}) failed",
                migration.version, migration.name
            )
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)",
            &[&migration.version, &migration.name],
        )
        .await?;
        tx.commit().await?;

        info!("Migration {} ({}) applied", migration.version, migration.name);
    }

    Ok(())
}
