//! Schema setup against Postgres

use anyhow::{Context, Result};
use clap::Parser;

use habitctl_server::db::{create_pool, migrations};

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

/// Create any missing tables and indexes; safe to run repeatedly
pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let pool = create_pool(&args.database_url)
        .await
        .context("Failed to connect to database")?;

    migrations::run(&pool)
        .await
        .context("Failed to apply schema")?;

    tracing::info!("schema is up to date");
    Ok(())
}
