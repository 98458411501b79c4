//! Fluent expression builders
//!
//! Every builder is entered through the [`MigrationContext`], which takes the
//! building latch, and is consumed by its async `execute()` call, which
//! validates the expression, renders it for the context's dialect, runs it
//! and releases the latch.
//!
//! ```ignore
//! ctx.create()?
//!     .table("users")
//!     .id("id")
//!     .string("email", 255)
//!     .timestamps()
//!     .execute()
//!     .await?;
//! ```
//!
//! A builder dropped before `execute()` keeps the latch set: the next builder
//! fails with [`MigrationError::IncompleteExpression`](crate::error::MigrationError::IncompleteExpression),
//! and so does the runner when the migration unit returns.

pub mod alter;
pub mod create;
pub mod delete;
pub mod execute;
pub mod insert;
pub mod rename;
pub mod update;

pub use alter::*;
pub use create::*;
pub use delete::*;
pub use execute::*;
pub use insert::*;
pub use rename::*;
pub use update::*;

use crate::context::MigrationContext;
use crate::error::MigrationResult;

impl MigrationContext {
    /// Change an existing table
    pub fn alter(&mut self) -> MigrationResult<AlterBuilder<'_>> {
        let token = self.try_begin_expression("alter")?;
        Ok(AlterBuilder::new(self, token))
    }

    /// Create a table, index or column
    pub fn create(&mut self) -> MigrationResult<CreateBuilder<'_>> {
        let token = self.try_begin_expression("create")?;
        Ok(CreateBuilder::new(self, token))
    }

    /// Drop a table, column, index or default constraint
    pub fn delete(&mut self) -> MigrationResult<DeleteBuilder<'_>> {
        let token = self.try_begin_expression("delete")?;
        Ok(DeleteBuilder::new(self, token))
    }

    /// Run raw SQL
    pub fn execute(&mut self) -> MigrationResult<ExecuteBuilder<'_>> {
        let token = self.try_begin_expression("execute")?;
        Ok(ExecuteBuilder::new(self, token))
    }

    /// Insert rows
    pub fn insert(&mut self) -> MigrationResult<InsertBuilder<'_>> {
        let token = self.try_begin_expression("insert")?;
        Ok(InsertBuilder::new(self, token))
    }

    /// Rename a table or column
    pub fn rename(&mut self) -> MigrationResult<RenameBuilder<'_>> {
        let token = self.try_begin_expression("rename")?;
        Ok(RenameBuilder::new(self, token))
    }

    /// Update rows
    pub fn update(&mut self) -> MigrationResult<UpdateBuilder<'_>> {
        let token = self.try_begin_expression("update")?;
        Ok(UpdateBuilder::new(self, token))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::backends::{DatabasePool, DialectKind};
    use crate::context::MigrationContext;
    use crate::fake::RecordingPool;

    pub async fn context(dialect: DialectKind) -> (RecordingPool, MigrationContext) {
        let pool = RecordingPool::new();
        let tx = pool.begin_transaction().await.unwrap();
        (pool, MigrationContext::new(tx, dialect.syntax_provider()))
    }
}
