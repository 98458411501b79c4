//! Execute builder: raw SQL statements and scripts

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::warn;

use crate::backends::DatabaseValue;
use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::{Expression, RawSqlExpression};

pub struct ExecuteBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> ExecuteBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    /// A single statement, sent as-is
    pub fn sql(self, sql: &str) -> ExecuteSqlBuilder<'a> {
        ExecuteSqlBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: RawSqlExpression {
                sql: sql.to_string(),
                params: Vec::new(),
            },
        }
    }

    /// Several `;`-separated statements
    pub fn script(self, script: &str) -> ExecuteScriptBuilder<'a> {
        ExecuteScriptBuilder {
            ctx: self.ctx,
            token: self.token,
            script: script.to_string(),
        }
    }
}

pub struct ExecuteSqlBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: RawSqlExpression,
}

impl<'a> ExecuteSqlBuilder<'a> {
    /// Bind the next positional parameter
    pub fn bind<T: Into<DatabaseValue>>(mut self, value: T) -> Self {
        self.expression.params.push(value.into());
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::RawSql(self.expression))
            .await
    }
}

pub struct ExecuteScriptBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    script: String,
}

impl<'a> ExecuteScriptBuilder<'a> {
    pub async fn execute(self) -> MigrationResult<()> {
        let mut expressions: Vec<Expression> = split_sql_statements(&self.script)
            .into_iter()
            .map(|sql| Expression::RawSql(RawSqlExpression { sql, params: Vec::new() }))
            .collect();
        if expressions.is_empty() {
            // Fails validation as empty SQL
            expressions.push(Expression::RawSql(RawSqlExpression {
                sql: String::new(),
                params: Vec::new(),
            }));
        }
        self.ctx.complete_all(self.token, expressions).await
    }
}

/// Split a script into statements using a SQL parser
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};

    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.into_iter().map(|statement| statement.to_string()).collect(),
        Err(e) => {
            warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}
