//! Insert builder

use crate::backends::DatabaseValue;
use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::{Expression, InsertRowExpression};

pub struct InsertBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> InsertBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    pub fn into_table(self, table: &str) -> InsertRowsBuilder<'a> {
        InsertRowsBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: InsertRowExpression {
                table: table.to_string(),
                rows: Vec::new(),
                identity_insert: false,
            },
        }
    }
}

pub struct InsertRowsBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: InsertRowExpression,
}

impl<'a> InsertRowsBuilder<'a> {
    /// Add one row as column/value pairs
    pub fn row<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        self.expression
            .rows
            .push(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Allow explicit values for identity columns
    pub fn identity_insert(mut self) -> Self {
        self.expression.identity_insert = true;
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::InsertRow(self.expression))
            .await
    }
}
