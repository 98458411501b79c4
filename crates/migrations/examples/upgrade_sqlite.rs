//! Upgrade an SQLite database file to the latest schema version
//!
//! ```text
//! ELIF_MIGRATIONS_TRANSACTION_SCOPE=per_migration cargo run --example upgrade_sqlite -- sqlite://app.db?mode=rwc
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use elif_migrations::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

struct CreateAccounts;

#[async_trait]
impl Migration for CreateAccounts {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.create()?
            .table("accounts")
            .id("id")
            .string("login", 100)
            .boolean("disabled")
            .timestamps()
            .execute()
            .await?;
        ctx.create()?
            .index("idx_accounts_login")
            .on_table("accounts")
            .on_column("login")
            .unique()
            .execute()
            .await
    }
}

struct SeedAdministrator;

#[async_trait]
impl Migration for SeedAdministrator {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.insert()?
            .into_table("accounts")
            .row([("login", "admin")])
            .execute()
            .await
    }
}

struct AddPasswordHash;

#[async_trait]
impl Migration for AddPasswordHash {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.alter()?
            .table("accounts")
            .add_column(ColumnDefinition::string("password_hash", 255))
            .execute()
            .await
    }
}

/// Logs instead of flushing a real cache or session store
struct LoggingSignals;

#[async_trait]
impl CacheInvalidation for LoggingSignals {
    async fn rebuild_cache(&self) -> MigrationResult<()> {
        tracing::info!("Rebuilding application caches");
        Ok(())
    }
}

#[async_trait]
impl SessionInvalidation for LoggingSignals {
    async fn invalidate_all_sessions(&self) -> MigrationResult<()> {
        tracing::info!("Revoking all issued sessions");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sqlite::memory:".to_string());
    let mut config = MigratorConfig::from_env()?;
    config.dialect = DialectKind::SQLite;

    let catalog = MigrationCatalog::new(vec![
        MigrationUnit::new(SemVersion::new(1, 0, 0), "create accounts", CreateAccounts),
        MigrationUnit::new(SemVersion::new(1, 1, 0), "seed administrator", SeedAdministrator).rebuild_cache(),
        MigrationUnit::new(SemVersion::new(2, 0, 0), "add password hash", AddPasswordHash)
            .invalidate_user_sessions(),
    ])?;

    let signals = Arc::new(LoggingSignals);
    let mut runner = MigrationRunner::builder()
        .pool(SqlitePool::connect(&url).await?)
        .catalog(catalog)
        .config(config)
        .cache_invalidation(signals.clone())
        .session_invalidation(signals)
        .build()?;

    let plan = runner.plan().await?;
    println!("{} migration(s) pending", plan.len());

    let report = runner.run().await?;
    println!(
        "{:?}: {} -> {} ({} applied, {} statements)",
        report.outcome,
        report.from_version.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "fresh".to_string()),
        report.to_version.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "fresh".to_string()),
        report.applied_count(),
        report.statements.len()
    );

    Ok(())
}
