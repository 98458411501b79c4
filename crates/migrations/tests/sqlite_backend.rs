//! Migration runs against a real in-memory SQLite database

use async_trait::async_trait;
use elif_migrations::prelude::*;
use elif_migrations::DatabasePool;

struct CreateUsers;

#[async_trait]
impl Migration for CreateUsers {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.create()?
            .table("users")
            .id("id")
            .string("email", 255)
            .boolean("active")
            .execute()
            .await?;
        ctx.create()?
            .index("idx_users_email")
            .on_table("users")
            .on_column("email")
            .unique()
            .execute()
            .await
    }
}

struct SeedUsers;

#[async_trait]
impl Migration for SeedUsers {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.insert()?
            .into_table("users")
            .row([("email", "ada@example.com")])
            .row([("email", "grace@example.com")])
            .execute()
            .await?;
        ctx.alter()?
            .table("users")
            .add_column(ColumnDefinition::string("nickname", 50))
            .execute()
            .await
    }
}

struct ActivateAda;

#[async_trait]
impl Migration for ActivateAda {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.update()?
            .table("users")
            .set("active", true)
            .set("nickname", "ada")
            .where_eq("email", "ada@example.com")
            .execute()
            .await
    }
}

struct CreateWidgets;

#[async_trait]
impl Migration for CreateWidgets {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.create()?.table("widgets").id("id").string("label", 40).execute().await
    }
}

struct Broken;

#[async_trait]
impl Migration for Broken {
    async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
        ctx.execute()?.sql("INSERT INTO no_such_table VALUES (1)").execute().await
    }
}

fn user_catalog() -> MigrationCatalog {
    MigrationCatalog::new(vec![
        MigrationUnit::new(SemVersion::new(1, 0, 0), "create users", CreateUsers),
        MigrationUnit::new(SemVersion::new(1, 1, 0), "seed users", SeedUsers),
        MigrationUnit::new(SemVersion::new(1, 2, 0), "activate ada", ActivateAda).rebuild_cache(),
    ])
    .unwrap()
}

fn runner(pool: &SqlitePool, catalog: MigrationCatalog) -> MigrationRunner {
    MigrationRunner::builder()
        .pool(pool.clone())
        .catalog(catalog)
        .config(MigratorConfig::new(DialectKind::SQLite))
        .build()
        .unwrap()
}

async fn recorded_version(pool: &SqlitePool) -> Option<String> {
    if !table_exists(pool, "elif_migration_state").await {
        return None;
    }
    pool.fetch_optional_string(
        "SELECT value FROM elif_migration_state WHERE id = ?",
        &[DatabaseValue::from("schema_version")],
    )
    .await
    .unwrap()
}

async fn table_exists(pool: &SqlitePool, table: &str) -> bool {
    pool.fetch_optional_string(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        &[DatabaseValue::from(table)],
    )
    .await
    .unwrap()
    .is_some()
}

#[tokio::test]
async fn test_fresh_database_is_brought_to_latest_version() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let mut runner = runner(&pool, user_catalog());

    let report = runner.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Committed);
    assert_eq!(report.applied_count(), 3);
    assert!(report.rebuild_cache);
    assert_eq!(recorded_version(&pool).await.as_deref(), Some("1.2.0"));

    let nickname = pool
        .fetch_optional_string(
            "SELECT nickname FROM users WHERE email = ? AND active = 1",
            &[DatabaseValue::from("ada@example.com")],
        )
        .await
        .unwrap();
    assert_eq!(nickname.as_deref(), Some("ada"));
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    runner(&pool, user_catalog()).run().await.unwrap();

    let report = runner(&pool, user_catalog()).run().await.unwrap();

    assert!(report.is_noop());
    assert_eq!(report.from_version, Some(SemVersion::new(1, 2, 0)));
    assert!(report.statements.is_empty());
}

#[tokio::test]
async fn test_new_release_runs_only_new_units() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    runner(&pool, user_catalog()).run().await.unwrap();

    let catalog = MigrationCatalog::builder()
        .add(MigrationUnit::new(SemVersion::new(1, 0, 0), "create users", CreateUsers))
        .add(MigrationUnit::new(SemVersion::new(1, 1, 0), "seed users", SeedUsers))
        .add(MigrationUnit::new(SemVersion::new(1, 2, 0), "activate ada", ActivateAda))
        .add(MigrationUnit::new(SemVersion::new(2, 0, 0), "create widgets", CreateWidgets))
        .build()
        .unwrap();
    let report = runner(&pool, catalog).run().await.unwrap();

    assert_eq!(report.applied, vec![SemVersion::new(2, 0, 0)]);
    assert!(table_exists(&pool, "widgets").await);
    assert_eq!(recorded_version(&pool).await.as_deref(), Some("2.0.0"));
}

#[tokio::test]
async fn test_failed_run_leaves_database_untouched() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let catalog = MigrationCatalog::new(vec![
        MigrationUnit::new(SemVersion::new(1, 0, 0), "create widgets", CreateWidgets),
        MigrationUnit::new(SemVersion::new(1, 1, 0), "broken", Broken),
    ])
    .unwrap();
    let mut runner = runner(&pool, catalog);

    let err = runner.run().await.unwrap_err();

    assert!(matches!(err, MigrationError::MigrationFailed { .. }));
    assert!(err.to_string().contains("1.1.0"));
    assert!(!table_exists(&pool, "widgets").await);
    assert!(!table_exists(&pool, "elif_migration_state").await);
    assert_eq!(recorded_version(&pool).await, None);
}

#[tokio::test]
async fn test_planning_does_not_create_the_version_table() {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let runner = runner(&pool, user_catalog());

    let plan = runner.plan().await.unwrap();

    assert_eq!(plan.len(), 3);
    assert!(!table_exists(&pool, "elif_migration_state").await);
}
