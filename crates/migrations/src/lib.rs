//! # elif-migrations: Versioned Schema Migrations for elif.rs
//!
//! Brings a database from whatever version it was last upgraded to up to the
//! version the application expects. Migrations are registered against a
//! semantic version and describe their changes through a fluent builder DSL
//! on a [`MigrationContext`]; expressions are validated, rendered for the
//! target SQL dialect and executed inside a transaction. A run either moves
//! the recorded version forward or leaves the database untouched.
//!
//! ```ignore
//! use elif_migrations::prelude::*;
//!
//! struct CreateUsers;
//!
//! #[async_trait::async_trait]
//! impl Migration for CreateUsers {
//!     async fn migrate(&self, ctx: &mut MigrationContext) -> MigrationResult<()> {
//!         ctx.create()?
//!             .table("users")
//!             .id("id")
//!             .string("email", 255)
//!             .timestamps()
//!             .execute()
//!             .await
//!     }
//! }
//!
//! let catalog = MigrationCatalog::new(vec![
//!     MigrationUnit::new(SemVersion::new(1, 0, 0), "create users", CreateUsers),
//! ])?;
//! let mut runner = MigrationRunner::builder()
//!     .pool(SqlitePool::connect("sqlite://app.db").await?)
//!     .catalog(catalog)
//!     .config(MigratorConfig::new(DialectKind::SQLite))
//!     .build()?;
//! let report = runner.run().await?;
//! ```

pub mod backends;
pub mod builders;
pub mod config;
pub mod context;
pub mod error;
pub mod expressions;
pub mod fake;
pub mod migrations;
pub mod semver;
pub mod syntax;

// Re-export core traits and types
pub use backends::{DatabasePool, DatabaseTransaction, DatabaseValue, DialectKind, PostgresPool, SqlitePool};
pub use builders::split_sql_statements;
pub use config::{MigratorConfig, TransactionScope};
pub use context::{ExecutedStatement, ExpressionToken, MigrationContext};
pub use error::{DriverError, FormatError, MigrationError, MigrationResult, ValidationKind};
pub use expressions::{ColumnDefault, ColumnDefinition, ColumnType, Expression, ReferentialAction, TableConstraint};
pub use migrations::{
    CacheInvalidation, InMemoryVersionStore, Migration, MigrationCatalog, MigrationPlan, MigrationRunReport,
    MigrationRunner, MigrationRunnerBuilder, MigrationUnit, RunOutcome, RunnerState, SessionInvalidation,
    TableVersionStore, VersionStore,
};
pub use semver::SemVersion;
pub use syntax::{Feature, SqlStatement, SqlSyntaxProvider};

/// Everything a migration author usually needs
pub mod prelude {
    pub use crate::backends::{DatabaseValue, DialectKind, PostgresPool, SqlitePool};
    pub use crate::config::{MigratorConfig, TransactionScope};
    pub use crate::context::MigrationContext;
    pub use crate::error::{MigrationError, MigrationResult};
    pub use crate::expressions::{ColumnDefault, ColumnDefinition, ColumnType, ReferentialAction};
    pub use crate::migrations::{
        CacheInvalidation, Migration, MigrationCatalog, MigrationRunner, MigrationUnit, RunOutcome,
        SessionInvalidation,
    };
    pub use crate::semver::SemVersion;
}
