//! Alter builder

use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::*;

pub struct AlterBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> AlterBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    pub fn table(self, name: &str) -> AlterTableBuilder<'a> {
        AlterTableBuilder {
            ctx: self.ctx,
            token: self.token,
            table: name.to_string(),
        }
    }
}

pub struct AlterTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    table: String,
}

impl<'a> AlterTableBuilder<'a> {
    pub fn add_column(self, column: ColumnDefinition) -> AlterColumnBuilder<'a> {
        AlterColumnBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: Expression::AddColumn(AddColumnExpression {
                table: self.table,
                column,
            }),
        }
    }

    /// Redefine an existing column: type, nullability and default
    pub fn alter_column(self, column: ColumnDefinition) -> AlterColumnBuilder<'a> {
        AlterColumnBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: Expression::AlterColumn(AlterColumnExpression {
                table: self.table,
                column,
            }),
        }
    }
}

pub struct AlterColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: Expression,
}

impl<'a> AlterColumnBuilder<'a> {
    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx.complete(self.token, self.expression).await
    }
}

#[cfg(test)]
mod tests {
    use crate::backends::DialectKind;
    use crate::builders::test_support::context;
    use crate::error::MigrationError;
    use crate::expressions::ColumnDefinition;

    #[tokio::test]
    async fn test_add_column() {
        let (pool, mut ctx) = context(DialectKind::SQLite).await;

        ctx.alter()
            .unwrap()
            .table("users")
            .add_column(ColumnDefinition::string("nickname", 50))
            .execute()
            .await
            .unwrap();

        assert_eq!(
            pool.statements(),
            vec!["ALTER TABLE \"users\" ADD COLUMN \"nickname\" TEXT NULL"]
        );
    }

    #[tokio::test]
    async fn test_alter_column_on_sqlite_is_unsupported() {
        let (pool, mut ctx) = context(DialectKind::SQLite).await;

        let err = ctx
            .alter()
            .unwrap()
            .table("users")
            .alter_column(ColumnDefinition::text("bio").not_null())
            .execute()
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Unsupported { .. }));
        assert!(pool.statements().is_empty());
        assert!(!ctx.is_building());
    }

    #[tokio::test]
    async fn test_alter_column_on_sql_server_resets_default() {
        let (pool, mut ctx) = context(DialectKind::SqlServer).await;

        ctx.alter()
            .unwrap()
            .table("users")
            .alter_column(ColumnDefinition::integer("score").not_null().default_value(0i32))
            .execute()
            .await
            .unwrap();

        let statements = pool.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[0].contains("sys.default_constraints"));
        assert_eq!(statements[1], "ALTER TABLE [users] ALTER COLUMN [score] INT NOT NULL");
        assert_eq!(
            statements[2],
            "ALTER TABLE [users] ADD CONSTRAINT [DF_users_score] DEFAULT 0 FOR [score]"
        );
    }
}
