//! Migration Context
//!
//! Per-run state shared by every migration unit: the open transaction, the
//! dialect's syntax provider, the single-slot latch that guards expression
//! construction, and the audit log of executed statements.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::backends::{DatabaseTransaction, DatabaseValue, DialectKind};
use crate::error::{MigrationError, MigrationResult};
use crate::expressions::Expression;
use crate::semver::SemVersion;
use crate::syntax::{SqlStatement, SqlSyntaxProvider};

/// Proof that the building latch is held.
///
/// Returned by [`MigrationContext::try_begin_expression`] and consumed by
/// [`MigrationContext::end_expression`]. Dropping a token without ending it
/// keeps the latch set, which the runner reports as an incomplete expression.
#[must_use = "an expression token must be passed to end_expression"]
#[derive(Debug)]
pub struct ExpressionToken {
    builder: &'static str,
}

impl ExpressionToken {
    /// Name of the builder that holds the latch
    pub fn builder(&self) -> &'static str {
        self.builder
    }
}

/// One statement sent to the database during a run
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
    /// Migration unit that issued the statement, if any
    pub version: Option<SemVersion>,
    pub sql: String,
    pub params: Vec<DatabaseValue>,
    pub rows_affected: u64,
    pub elapsed: Duration,
}

pub struct MigrationContext {
    transaction: Option<Box<dyn DatabaseTransaction>>,
    syntax: Arc<dyn SqlSyntaxProvider>,
    building: Option<&'static str>,
    current_version: Option<SemVersion>,
    log: Vec<ExecutedStatement>,
}

impl std::fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("dialect", &self.syntax.kind())
            .field("has_transaction", &self.transaction.is_some())
            .field("building", &self.building)
            .field("current_version", &self.current_version)
            .field("statements", &self.log.len())
            .finish()
    }
}

impl MigrationContext {
    pub fn new(transaction: Box<dyn DatabaseTransaction>, syntax: Arc<dyn SqlSyntaxProvider>) -> Self {
        Self {
            transaction: Some(transaction),
            syntax,
            building: None,
            current_version: None,
            log: Vec::new(),
        }
    }

    /// The active syntax provider
    pub fn syntax(&self) -> &dyn SqlSyntaxProvider {
        self.syntax.as_ref()
    }

    pub fn dialect(&self) -> DialectKind {
        self.syntax.kind()
    }

    /// Version of the migration unit currently running
    pub fn current_version(&self) -> Option<&SemVersion> {
        self.current_version.as_ref()
    }

    /// Acquire the building latch.
    ///
    /// Fails with [`MigrationError::IncompleteExpression`] when another
    /// expression is still under construction.
    pub fn try_begin_expression(&mut self, builder: &'static str) -> MigrationResult<ExpressionToken> {
        if let Some(pending) = self.building {
            return Err(MigrationError::IncompleteExpression(format!(
                "cannot start a {} expression while a {} expression has not been executed",
                builder, pending
            )));
        }
        self.building = Some(builder);
        Ok(ExpressionToken { builder })
    }

    /// Release the building latch
    pub fn end_expression(&mut self, token: ExpressionToken) {
        debug_assert_eq!(self.building, Some(token.builder));
        self.building = None;
    }

    /// Whether an expression is under construction
    pub fn is_building(&self) -> bool {
        self.building.is_some()
    }

    /// Name of the builder holding the latch
    pub fn pending_expression(&self) -> Option<&'static str> {
        self.building
    }

    /// Validate, render and execute a finished expression.
    ///
    /// The latch is released whatever the outcome.
    pub async fn complete(&mut self, token: ExpressionToken, expression: Expression) -> MigrationResult<()> {
        self.complete_all(token, vec![expression]).await
    }

    /// Like [`complete`](Self::complete) for a builder that produced several
    /// expressions. Every expression is validated before anything executes.
    pub async fn complete_all(
        &mut self,
        token: ExpressionToken,
        expressions: Vec<Expression>,
    ) -> MigrationResult<()> {
        let result = self.run_expressions(&expressions).await;
        self.end_expression(token);
        result
    }

    async fn run_expressions(&mut self, expressions: &[Expression]) -> MigrationResult<()> {
        let mut statements = Vec::new();
        for expression in expressions {
            expression.validate()?;
            statements.extend(self.syntax.render(expression)?);
        }
        for statement in &statements {
            self.execute_statement(statement).await?;
        }
        Ok(())
    }

    /// Execute one rendered statement inside the run's transaction
    pub async fn execute_statement(&mut self, statement: &SqlStatement) -> MigrationResult<u64> {
        let dialect = self.syntax.kind();
        let transaction = self
            .transaction
            .as_mut()
            .ok_or_else(|| MigrationError::Transaction("No active transaction".to_string()))?;

        let started = Instant::now();
        let rows_affected = transaction.execute(&statement.sql, &statement.params).await?;
        let elapsed = started.elapsed();

        debug!(
            version = %self.current_version.as_ref().map(ToString::to_string).unwrap_or_default(),
            dialect = %dialect,
            sql = %statement.sql,
            rows_affected,
            elapsed_ms = elapsed.as_millis() as u64,
            "Executed migration statement"
        );

        self.log.push(ExecutedStatement {
            version: self.current_version.clone(),
            sql: statement.sql.clone(),
            params: statement.params.clone(),
            rows_affected,
            elapsed,
        });

        Ok(rows_affected)
    }

    /// Read a single text value, e.g. to make a data migration conditional
    pub async fn fetch_optional_string(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Option<String>> {
        let transaction = self
            .transaction
            .as_mut()
            .ok_or_else(|| MigrationError::Transaction("No active transaction".to_string()))?;
        transaction.fetch_optional_string(sql, params).await
    }

    /// Statements executed so far
    pub fn executed_statements(&self) -> &[ExecutedStatement] {
        &self.log
    }

    pub(crate) fn set_current_version(&mut self, version: Option<SemVersion>) {
        self.current_version = version;
    }

    pub(crate) fn transaction_mut(&mut self) -> MigrationResult<&mut Box<dyn DatabaseTransaction>> {
        self.transaction
            .as_mut()
            .ok_or_else(|| MigrationError::Transaction("No active transaction".to_string()))
    }

    pub(crate) fn take_transaction(&mut self) -> Option<Box<dyn DatabaseTransaction>> {
        self.transaction.take()
    }

    pub(crate) fn attach_transaction(&mut self, transaction: Box<dyn DatabaseTransaction>) {
        self.transaction = Some(transaction);
    }

    pub(crate) fn into_log(self) -> Vec<ExecutedStatement> {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::DatabasePool;
    use crate::expressions::{RawSqlExpression, DropTableExpression};
    use crate::fake::RecordingPool;

    async fn context() -> (RecordingPool, MigrationContext) {
        let pool = RecordingPool::new();
        let tx = pool.begin_transaction().await.unwrap();
        let ctx = MigrationContext::new(tx, DialectKind::PostgreSQL.syntax_provider());
        (pool, ctx)
    }

    #[tokio::test]
    async fn test_second_expression_is_rejected_while_building() {
        let (_pool, mut ctx) = context().await;

        let token = ctx.try_begin_expression("create").unwrap();
        let err = ctx.try_begin_expression("delete").unwrap_err();
        assert!(matches!(err, MigrationError::IncompleteExpression(_)));
        assert_eq!(ctx.pending_expression(), Some("create"));

        ctx.end_expression(token);
        assert!(!ctx.is_building());
        let token = ctx.try_begin_expression("delete").unwrap();
        ctx.end_expression(token);
    }

    #[tokio::test]
    async fn test_complete_releases_latch_on_validation_error() {
        let (pool, mut ctx) = context().await;

        let token = ctx.try_begin_expression("execute").unwrap();
        let err = ctx
            .complete(token, Expression::RawSql(RawSqlExpression { sql: "".into(), params: vec![] }))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::ExpressionValidation { .. }));
        assert!(!ctx.is_building());
        assert!(pool.statements().is_empty());
    }

    #[tokio::test]
    async fn test_executed_statements_are_logged() {
        let (pool, mut ctx) = context().await;
        ctx.set_current_version(Some(SemVersion::new(1, 2, 0)));

        let token = ctx.try_begin_expression("delete").unwrap();
        ctx.complete(
            token,
            Expression::DropTable(DropTableExpression { table: "legacy".into(), if_exists: true }),
        )
        .await
        .unwrap();

        let log = ctx.executed_statements();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].sql, "DROP TABLE IF EXISTS \"legacy\"");
        assert_eq!(log[0].version, Some(SemVersion::new(1, 2, 0)));
        assert_eq!(pool.statements(), vec!["DROP TABLE IF EXISTS \"legacy\"".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_fails_without_transaction() {
        let (_pool, mut ctx) = context().await;
        let _tx = ctx.take_transaction();
        let err = ctx.execute_statement(&SqlStatement::new("SELECT 1")).await.unwrap_err();
        assert!(matches!(err, MigrationError::Transaction(_)));
    }
}
