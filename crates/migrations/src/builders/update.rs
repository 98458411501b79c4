//! Update builder

use crate::backends::DatabaseValue;
use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::{Expression, UpdateRowsExpression};

pub struct UpdateBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> UpdateBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    pub fn table(self, table: &str) -> UpdateRowsBuilder<'a> {
        UpdateRowsBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: UpdateRowsExpression {
                table: table.to_string(),
                assignments: Vec::new(),
                conditions: Vec::new(),
                all_rows: false,
            },
        }
    }
}

pub struct UpdateRowsBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: UpdateRowsExpression,
}

impl<'a> UpdateRowsBuilder<'a> {
    pub fn set<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.expression.assignments.push((column.to_string(), value.into()));
        self
    }

    /// Equality condition; a null value matches with `IS NULL`
    pub fn where_eq<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.expression.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Update every row of the table
    pub fn all_rows(mut self) -> Self {
        self.expression.all_rows = true;
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::UpdateRows(self.expression))
            .await
    }
}
