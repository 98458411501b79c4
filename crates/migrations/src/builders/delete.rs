//! Delete builder: tables, columns, indexes and default constraints

use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::*;

pub struct DeleteBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> DeleteBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    pub fn table(self, name: &str) -> DeleteTableBuilder<'a> {
        DeleteTableBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: DropTableExpression {
                table: name.to_string(),
                if_exists: false,
            },
        }
    }

    pub fn column(self, name: &str) -> DeleteColumnBuilder<'a> {
        DeleteColumnBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: DropColumnExpression {
                table: String::new(),
                columns: vec![name.to_string()],
            },
        }
    }

    pub fn index(self, name: &str) -> DeleteIndexBuilder<'a> {
        DeleteIndexBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: DropIndexExpression {
                name: name.to_string(),
                table: None,
            },
        }
    }

    pub fn default_constraint(self) -> DeleteDefaultConstraintBuilder<'a> {
        DeleteDefaultConstraintBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: DropDefaultConstraintExpression {
                table: String::new(),
                column: String::new(),
            },
        }
    }
}

pub struct DeleteTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: DropTableExpression,
}

impl<'a> DeleteTableBuilder<'a> {
    pub fn if_exists(mut self) -> Self {
        self.expression.if_exists = true;
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::DropTable(self.expression))
            .await
    }
}

pub struct DeleteColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: DropColumnExpression,
}

impl<'a> DeleteColumnBuilder<'a> {
    /// Drop another column of the same table
    pub fn column(mut self, name: &str) -> Self {
        self.expression.columns.push(name.to_string());
        self
    }

    pub fn from_table(mut self, table: &str) -> Self {
        self.expression.table = table.to_string();
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::DropColumn(self.expression))
            .await
    }
}

pub struct DeleteIndexBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: DropIndexExpression,
}

impl<'a> DeleteIndexBuilder<'a> {
    pub fn on_table(mut self, table: &str) -> Self {
        self.expression.table = Some(table.to_string());
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::DropIndex(self.expression))
            .await
    }
}

pub struct DeleteDefaultConstraintBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: DropDefaultConstraintExpression,
}

impl<'a> DeleteDefaultConstraintBuilder<'a> {
    pub fn on_table(mut self, table: &str) -> Self {
        self.expression.table = table.to_string();
        self
    }

    pub fn on_column(mut self, column: &str) -> Self {
        self.expression.column = column.to_string();
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::DropDefaultConstraint(self.expression))
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::backends::DialectKind;
    use crate::builders::test_support::context;
    use crate::error::{MigrationError, ValidationKind};

    #[tokio::test]
    async fn test_drop_columns_from_table() {
        let (pool, mut ctx) = context(DialectKind::SQLite).await;

        ctx.delete()
            .unwrap()
            .column("legacy_a")
            .column("legacy_b")
            .from_table("users")
            .execute()
            .await
            .unwrap();

        assert_eq!(
            pool.statements(),
            vec![
                "ALTER TABLE \"users\" DROP COLUMN \"legacy_a\"",
                "ALTER TABLE \"users\" DROP COLUMN \"legacy_b\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_drop_column_needs_table() {
        let (_pool, mut ctx) = context(DialectKind::PostgreSQL).await;

        let err = ctx.delete().unwrap().column("x").execute().await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::ExpressionValidation { kind: ValidationKind::MissingTable, .. }
        ));
    }

    #[tokio::test]
    async fn test_drop_index_on_sql_server() {
        let (pool, mut ctx) = context(DialectKind::SqlServer).await;

        ctx.delete()
            .unwrap()
            .index("ix_users_email")
            .on_table("users")
            .execute()
            .await
            .unwrap();

        assert_eq!(pool.statements(), vec!["DROP INDEX [ix_users_email] ON [users]"]);
    }

    #[tokio::test]
    async fn test_drop_default_constraint_on_postgres() {
        let (pool, mut ctx) = context(DialectKind::PostgreSQL).await;

        ctx.delete()
            .unwrap()
            .default_constraint()
            .on_table("users")
            .on_column("active")
            .execute()
            .await
            .unwrap();

        assert_eq!(
            pool.statements(),
            vec!["ALTER TABLE \"users\" ALTER COLUMN \"active\" DROP DEFAULT"]
        );
    }
}
