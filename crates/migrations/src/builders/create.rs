//! Create builder: tables, indexes and single columns

use crate::context::{ExpressionToken, MigrationContext};
use crate::error::MigrationResult;
use crate::expressions::*;

pub struct CreateBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
}

impl<'a> CreateBuilder<'a> {
    pub(crate) fn new(ctx: &'a mut MigrationContext, token: ExpressionToken) -> Self {
        Self { ctx, token }
    }

    pub fn table(self, name: &str) -> CreateTableBuilder<'a> {
        CreateTableBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: CreateTableExpression {
                table: name.to_string(),
                columns: Vec::new(),
                constraints: Vec::new(),
                if_not_exists: false,
            },
        }
    }

    pub fn index(self, name: &str) -> CreateIndexBuilder<'a> {
        CreateIndexBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: CreateIndexExpression {
                name: name.to_string(),
                table: String::new(),
                columns: Vec::new(),
                unique: false,
                filter: None,
            },
        }
    }

    /// Add a column to an existing table
    pub fn column(self, column: ColumnDefinition) -> CreateColumnBuilder<'a> {
        CreateColumnBuilder {
            ctx: self.ctx,
            token: self.token,
            expression: AddColumnExpression {
                table: String::new(),
                column,
            },
        }
    }
}

pub struct CreateTableBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: CreateTableExpression,
}

impl<'a> CreateTableBuilder<'a> {
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.expression.columns.push(column);
        self
    }

    /// Auto-incrementing integer primary key
    pub fn id(self, name: &str) -> Self {
        self.column(ColumnDefinition::id(name))
    }

    /// Non-null UUID column
    pub fn uuid(self, name: &str) -> Self {
        self.column(ColumnDefinition::guid(name).not_null())
    }

    /// Non-null bounded text column
    pub fn string(self, name: &str, length: u32) -> Self {
        self.column(ColumnDefinition::string(name, length).not_null())
    }

    pub fn text(self, name: &str) -> Self {
        self.column(ColumnDefinition::text(name))
    }

    pub fn integer(self, name: &str) -> Self {
        self.column(ColumnDefinition::integer(name).not_null())
    }

    pub fn big_integer(self, name: &str) -> Self {
        self.column(ColumnDefinition::big_integer(name).not_null())
    }

    pub fn boolean(self, name: &str) -> Self {
        self.column(ColumnDefinition::boolean(name).not_null().default_value(false))
    }

    pub fn datetime(self, name: &str) -> Self {
        self.column(ColumnDefinition::datetime(name))
    }

    /// `created_at` and `updated_at` defaulting to the current time
    pub fn timestamps(self) -> Self {
        self.column(ColumnDefinition::datetime("created_at").not_null().default_current_timestamp())
            .column(ColumnDefinition::datetime("updated_at").not_null().default_current_timestamp())
    }

    /// Composite primary key
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.expression.constraints.push(TableConstraint::PrimaryKey {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn primary_key_named(mut self, name: &str, columns: &[&str]) -> Self {
        self.expression.constraints.push(TableConstraint::PrimaryKey {
            name: Some(name.to_string()),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.expression.constraints.push(TableConstraint::Unique {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn foreign_key(mut self, column: &str, references_table: &str, references_column: &str) -> Self {
        self.expression.constraints.push(TableConstraint::ForeignKey {
            name: None,
            column: column.to_string(),
            references: ForeignKeyReference {
                table: references_table.to_string(),
                column: references_column.to_string(),
                on_delete: ReferentialAction::NoAction,
            },
        });
        self
    }

    /// Add a table-level constraint as-is
    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.expression.constraints.push(constraint);
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.expression.if_not_exists = true;
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::CreateTable(self.expression))
            .await
    }
}

pub struct CreateIndexBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: CreateIndexExpression,
}

impl<'a> CreateIndexBuilder<'a> {
    pub fn on_table(mut self, table: &str) -> Self {
        self.expression.table = table.to_string();
        self
    }

    pub fn on_column(mut self, column: &str) -> Self {
        self.expression.columns.push(column.to_string());
        self
    }

    pub fn on_columns(mut self, columns: &[&str]) -> Self {
        self.expression.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn unique(mut self) -> Self {
        self.expression.unique = true;
        self
    }

    /// Only index rows matching `predicate`
    pub fn filter(mut self, predicate: &str) -> Self {
        self.expression.filter = Some(predicate.to_string());
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::CreateIndex(self.expression))
            .await
    }
}

pub struct CreateColumnBuilder<'a> {
    ctx: &'a mut MigrationContext,
    token: ExpressionToken,
    expression: AddColumnExpression,
}

impl<'a> CreateColumnBuilder<'a> {
    pub fn on_table(mut self, table: &str) -> Self {
        self.expression.table = table.to_string();
        self
    }

    pub async fn execute(self) -> MigrationResult<()> {
        self.ctx
            .complete(self.token, Expression::AddColumn(self.expression))
            .await
    }
}
