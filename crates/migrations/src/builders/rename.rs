//! Rename builder

use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::{Expression, RenameColumnExpression, RenameTableExpression};

pub struct RenameBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> RenameBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    pub fn table(self, old_name: &str) -> RenameTableBuilder<'a> {
        RenameTableBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: RenameTableExpression {
                old_name: old_name.to_string(),
                new_name: String::new(),
            },
        }
    }

    pub fn column(self, old_name: &str) -> RenameColumnBuilder<'a> {
        RenameColumnBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: RenameColumnExpression {
                table: String::new(),
                old_name: old_name.to_string(),
                new_name: String::new(),
            },
        }
    }
}

pub struct RenameTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: RenameTableExpression,
}

impl<'a> RenameTableBuilder<'a> {
    pub fn to(mut self, new_name: &str) -> Self {
        self.expression.new_name = new_name.to_string();
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::RenameTable(self.expression))
            .await
    }
}

pub struct RenameColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: RenameColumnExpression,
}

impl<'a> RenameColumnBuilder<'a> {
    pub fn on_table(mut self, table: &str) -> Self {
        self.expression.table = table.to_string();
        self
    }

    pub fn to(mut self, new_name: &str) -> Self {
        self.expression.new_name = new_name.to_string();
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::RenameColumn(self.expression))
            .await
    }
}

#[cfg(test)]
mod tests {
    use crate::backends::DialectKind;
    use crate::builders::test_support::context;
    use crate::error::{MigrationError, ValidationKind};

    #[tokio::test]
    async fn test_rename_table_and_column() {
        let (pool, mut ctx) = context(DialectKind::PostgreSQL).await;

        ctx.rename().unwrap().table("people").to("users").execute().await.unwrap();
        ctx.rename()
            .unwrap()
            .column("mail")
            .on_table("users")
            .to("email")
            .execute()
            .await
            .unwrap();

        assert_eq!(
            pool.statements(),
            vec![
                "ALTER TABLE \"people\" RENAME TO \"users\"",
                "ALTER TABLE \"users\" RENAME COLUMN \"mail\" TO \"email\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_without_target_fails() {
        let (_pool, mut ctx) = context(DialectKind::PostgreSQL).await;

        let err = ctx.rename().unwrap().table("people").execute().await.unwrap_err();
        assert!(matches!(
            err,
            MigrationError::ExpressionValidation { kind: ValidationKind::InvalidRename, .. }
        ));
    }
}
