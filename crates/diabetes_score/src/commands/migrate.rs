//! Migrate command - applies the embedded database migrations.

use anyhow::{Context, Result};
use database::{create_pool, run_migrations};
use tracing::info;

/// Runs the migrate command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or a migration fails.
pub async fn run(database_url: &str) -> Result<()> {
    let pool = create_pool(database_url)
        .await
        .with_context(|| format!("failed to open database at {database_url}"))?;

    run_migrations(&pool).await.context("failed to run migrations")?;
    info!("Migrations completed successfully");

    Ok(())
}
