//! HTTP server command
//!
//! Runs the habit API against Postgres, or against the in-memory store with
//! `--memory` for local experiments.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use clap::Parser;

use habitctl_server::auth::AuthSettings;
use habitctl_server::db::{create_pool_with_options, migrations, DEFAULT_MAX_CONNECTIONS};
use habitctl_server::{run_server, HabitStore, MemoryStore, PgStore, ServerConfig};

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Keep everything in memory (data is lost on exit)
    #[arg(long)]
    pub memory: bool,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Access token lifetime in minutes
    #[arg(
        long,
        env = "HABITS_ACCESS_TOKEN_MINUTES",
        default_value_t = 60,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub access_token_minutes: i64,

    /// Refresh token lifetime in hours
    #[arg(
        long,
        env = "HABITS_REFRESH_TOKEN_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..)
    )]
    pub refresh_token_hours: i64,

    /// IANA time zone used to decide what "today" is
    #[arg(long, env = "HABITS_TIMEZONE", default_value = "UTC")]
    pub timezone: String,

    /// Maximum pooled database connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl ServeArgs {
    fn server_config(&self) -> Result<ServerConfig> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| anyhow!("invalid time zone '{}': {}", self.timezone, e))?;

        Ok(ServerConfig {
            bind_addr: self.bind,
            cors_permissive: self.cors_permissive,
            auth: AuthSettings {
                access_ttl: Duration::minutes(self.access_token_minutes),
                refresh_ttl: Duration::hours(self.refresh_token_hours),
            },
            timezone,
        })
    }
}

async fn open_store(args: &ServeArgs) -> Result<Arc<dyn HabitStore>> {
    if args.memory {
        tracing::warn!("using in-memory store; nothing will be persisted");
        let store: Arc<dyn HabitStore> = MemoryStore::new_shared();
        return Ok(store);
    }

    let database_url = args
        .database_url
        .as_deref()
        .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env or .env, or pass --memory")?;

    let pool = create_pool_with_options(database_url, args.max_connections)
        .await
        .context("Failed to create database pool")?;
    migrations::run(&pool)
        .await
        .context("Failed to apply schema")?;

    Ok(Arc::new(PgStore::new(pool)))
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = args.server_config()?;
    let store = open_store(&args).await?;

    tracing::info!("Starting habitctl server on {}", config.bind_addr);

    run_server(store, config).await.context("Server error")?;

    Ok(())
}
