//! Recorded-version store
//!
//! Persists the schema version an installation is at. Reading never changes
//! the database; the version table is created and written inside the run's
//! transaction, so it moves only when the migrations that produced it commit.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::backends::{DatabasePool, DatabaseTransaction, DatabaseValue};
use crate::config::MigratorConfig;
use crate::error::MigrationResult;
use crate::expressions::{ColumnDefinition, CreateTableExpression, Expression};
use crate::semver::SemVersion;
use crate::syntax::SqlSyntaxProvider;

#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Recorded version, `None` for a fresh installation
    async fn current_version(&self, pool: &dyn DatabasePool) -> MigrationResult<Option<SemVersion>>;

    /// Record `version` as part of the open transaction
    async fn set_current_version(
        &self,
        tx: &mut dyn DatabaseTransaction,
        version: &SemVersion,
    ) -> MigrationResult<()>;
}

/// Key/value row in the target database
#[derive(Debug, Clone)]
pub struct TableVersionStore {
    syntax: Arc<dyn SqlSyntaxProvider>,
    table: String,
    key: String,
    strict: bool,
}

impl TableVersionStore {
    pub fn new(syntax: Arc<dyn SqlSyntaxProvider>, table: &str, key: &str) -> Self {
        Self {
            syntax,
            table: table.to_string(),
            key: key.to_string(),
            strict: false,
        }
    }

    pub fn from_config(config: &MigratorConfig) -> Self {
        Self {
            syntax: config.dialect.syntax_provider(),
            table: config.version_table.clone(),
            key: config.version_key.clone(),
            strict: config.strict_versions,
        }
    }

    fn create_table_statements(&self) -> MigrationResult<Vec<String>> {
        let expression = Expression::CreateTable(CreateTableExpression {
            table: self.table.clone(),
            columns: vec![
                ColumnDefinition::string("id", 100).primary_key(),
                ColumnDefinition::string("value", 255).not_null(),
            ],
            constraints: Vec::new(),
            if_not_exists: true,
        });
        Ok(self
            .syntax
            .render(&expression)?
            .into_iter()
            .map(|statement| statement.sql)
            .collect())
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.syntax.quote_identifier("value"),
            self.syntax.quote_identifier(&self.table),
            self.syntax.quote_identifier("id"),
            self.syntax.parameter_placeholder(0)
        )
    }
}

#[async_trait]
impl VersionStore for TableVersionStore {
    async fn current_version(&self, pool: &dyn DatabasePool) -> MigrationResult<Option<SemVersion>> {
        let exists = self.syntax.table_exists_query(&self.table);
        if pool.fetch_optional_string(&exists.sql, &exists.params).await?.is_none() {
            return Ok(None);
        }

        let value = pool
            .fetch_optional_string(&self.select_sql(), &[DatabaseValue::from(self.key.as_str())])
            .await?;

        match value {
            Some(text) => Ok(Some(SemVersion::parse(text.trim(), self.strict)?)),
            None => Ok(None),
        }
    }

    async fn set_current_version(
        &self,
        tx: &mut dyn DatabaseTransaction,
        version: &SemVersion,
    ) -> MigrationResult<()> {
        for sql in self.create_table_statements()? {
            tx.execute(&sql, &[]).await?;
        }

        let sql = self.syntax.render_upsert(&self.table, &["id"], &["id", "value"])?;
        tx.execute(
            &sql,
            &[DatabaseValue::from(self.key.as_str()), DatabaseValue::from(version.to_string())],
        )
        .await?;
        debug!("Recorded schema version {} in {}", version, self.table);
        Ok(())
    }
}

/// Version kept in memory; writes are not undone by a rollback
#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    version: Mutex<Option<SemVersion>>,
}

impl InMemoryVersionStore {
    pub fn new(version: Option<SemVersion>) -> Self {
        Self {
            version: Mutex::new(version),
        }
    }

    pub fn version(&self) -> Option<SemVersion> {
        self.version
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn current_version(&self, _pool: &dyn DatabasePool) -> MigrationResult<Option<SemVersion>> {
        Ok(self.version())
    }

    async fn set_current_version(
        &self,
        _tx: &mut dyn DatabaseTransaction,
        version: &SemVersion,
    ) -> MigrationResult<()> {
        *self
            .version
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(version.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DialectKind;
    use crate::error::MigrationError;
    use crate::fake::RecordingPool;

    #[tokio::test]
    async fn test_fresh_database_has_no_version() {
        let pool = RecordingPool::new();
        let store = TableVersionStore::from_config(&MigratorConfig::new(DialectKind::PostgreSQL));

        assert_eq!(store.current_version(&pool).await.unwrap(), None);
        assert!(pool.statements().is_empty());
        assert_eq!(pool.transactions_begun(), 0);
    }

    #[tokio::test]
    async fn test_missing_table_skips_the_value_query() {
        let pool = RecordingPool::new().respond_to("SELECT \"value\"", "7.4.0");
        let store = TableVersionStore::from_config(&MigratorConfig::new(DialectKind::SQLite));

        assert_eq!(store.current_version(&pool).await.unwrap(), None);
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn test_reads_recorded_version() {
        let pool = RecordingPool::new()
            .respond_to("sqlite_master", "1")
            .respond_to("SELECT \"value\" FROM \"elif_migration_state\"", "7.4.0");
        let store = TableVersionStore::from_config(&MigratorConfig::new(DialectKind::SQLite));

        assert_eq!(store.current_version(&pool).await.unwrap(), Some(SemVersion::new(7, 4, 0)));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_short_versions() {
        let pool = RecordingPool::new().respond_to("SELECT", "7");
        let mut config = MigratorConfig::new(DialectKind::SQLite);
        config.strict_versions = true;
        let store = TableVersionStore::from_config(&config);

        let err = store.current_version(&pool).await.unwrap_err();
        assert!(matches!(err, MigrationError::Format(_)));
    }

    #[tokio::test]
    async fn test_write_uses_dialect_upsert() {
        let pool = RecordingPool::new();
        let store = TableVersionStore::from_config(&MigratorConfig::new(DialectKind::PostgreSQL));

        let mut tx = pool.begin_transaction().await.unwrap();
        store.set_current_version(tx.as_mut(), &SemVersion::new(2, 0, 0)).await.unwrap();
        tx.commit().await.unwrap();

        let committed = pool.committed_statements();
        assert_eq!(committed.len(), 2);
        assert!(committed[0].starts_with("CREATE TABLE IF NOT EXISTS \"elif_migration_state\""));
        assert_eq!(
            committed[1],
            "INSERT INTO \"elif_migration_state\" (\"id\", \"value\") VALUES ($1, $2) \
             ON CONFLICT (\"id\") DO UPDATE SET \"value\" = EXCLUDED.\"value\""
        );
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let pool = RecordingPool::new();
        let store = InMemoryVersionStore::new(Some(SemVersion::new(1, 0, 0)));
        let mut tx = pool.begin_transaction().await.unwrap();

        store.set_current_version(tx.as_mut(), &SemVersion::new(1, 1, 0)).await.unwrap();
        assert_eq!(store.current_version(&pool).await.unwrap(), Some(SemVersion::new(1, 1, 0)));
    }
}
