//! SQL syntax providers
//!
//! A [`SqlSyntaxProvider`] turns an [`Expression`] into dialect-specific SQL.
//! Providers are stateless; the default methods render standard SQL and each
//! dialect overrides what its engine does differently.

pub mod ansi;
pub mod postgres;
pub mod sqlite;
pub mod sqlserver;

pub use ansi::AnsiSyntax;
pub use postgres::PostgresSyntax;
pub use sqlite::SqliteSyntax;
pub use sqlserver::SqlServerSyntax;

use std::fmt;
use std::sync::Arc;

use crate::backends::{DatabaseValue, DialectKind};
use crate::error::{MigrationError, MigrationResult, ValidationKind};
use crate::expressions::*;

/// A rendered statement with its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<DatabaseValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Optional capabilities that differ between engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    ComputedColumns,
    FilteredIndexes,
    AlterColumn,
    DropColumn,
    RenameColumn,
    DropDefaultConstraint,
    TransactionalDdl,
    IdentityInsert,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::ComputedColumns => "computed columns",
            Feature::FilteredIndexes => "filtered indexes",
            Feature::AlterColumn => "altering columns",
            Feature::DropColumn => "dropping columns",
            Feature::RenameColumn => "renaming columns",
            Feature::DropDefaultConstraint => "dropping default constraints",
            Feature::TransactionalDdl => "transactional DDL",
            Feature::IdentityInsert => "identity insert",
        };
        f.write_str(name)
    }
}

impl DialectKind {
    /// The syntax provider for this dialect
    pub fn syntax_provider(&self) -> Arc<dyn SqlSyntaxProvider> {
        match self {
            DialectKind::Ansi => Arc::new(AnsiSyntax),
            DialectKind::PostgreSQL => Arc::new(PostgresSyntax),
            DialectKind::SQLite => Arc::new(SqliteSyntax),
            DialectKind::SqlServer => Arc::new(SqlServerSyntax),
        }
    }
}

/// Escape a string literal by doubling single quotes
pub(crate) fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Capability interface implemented once per SQL engine
pub trait SqlSyntaxProvider: Send + Sync + fmt::Debug {
    /// Which dialect this provider renders
    fn kind(&self) -> DialectKind;

    /// Type name for an abstract column type
    fn column_type(&self, column_type: &ColumnType) -> String;

    /// Parameter placeholder for the zero-based parameter index
    fn parameter_placeholder(&self, index: usize) -> String;

    /// Whether the engine supports an optional feature
    fn supports(&self, feature: Feature) -> bool;

    /// Current timestamp expression usable as a column default
    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Quote an identifier, escaping embedded quote characters
    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Column clause that makes a column auto-increment
    fn identity_clause(&self) -> &'static str {
        "GENERATED BY DEFAULT AS IDENTITY"
    }

    /// Render a value as an inline SQL literal
    fn render_literal(&self, value: &DatabaseValue) -> String {
        match value {
            DatabaseValue::Null => "NULL".to_string(),
            DatabaseValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            DatabaseValue::Int32(i) => i.to_string(),
            DatabaseValue::Int64(i) => i.to_string(),
            DatabaseValue::Float64(f) => f.to_string(),
            DatabaseValue::Decimal(d) => d.clone(),
            DatabaseValue::String(s) => quote_string(s),
            DatabaseValue::Bytes(b) => format!("X'{}'", hex::encode_upper(b)),
            DatabaseValue::Uuid(u) => quote_string(&u.to_string()),
            DatabaseValue::DateTime(dt) => quote_string(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            DatabaseValue::Json(j) => quote_string(&j.to_string()),
        }
    }

    /// Render a default clause
    fn render_default(&self, _table: &str, _column: &str, default: &ColumnDefault) -> String {
        format!("DEFAULT {}", self.render_default_value(default))
    }

    /// Render the value part of a default clause
    fn render_default_value(&self, default: &ColumnDefault) -> String {
        match default {
            ColumnDefault::Value(value) => self.render_literal(value),
            ColumnDefault::CurrentTimestamp => self.current_timestamp().to_string(),
            ColumnDefault::Raw(sql) => sql.clone(),
        }
    }

    /// Render a full column definition
    fn render_column(&self, table: &str, column: &ColumnDefinition) -> MigrationResult<String> {
        let mut parts = vec![self.quote_identifier(&column.name), self.column_type(&column.column_type)];

        if let Some(expression) = &column.computed {
            if !self.supports(Feature::ComputedColumns) {
                return Err(MigrationError::unsupported(self.kind(), Feature::ComputedColumns.to_string()));
            }
            parts.push(format!("GENERATED ALWAYS AS ({}) STORED", expression));
        }
        if let Some(default) = &column.default {
            parts.push(self.render_default(table, &column.name, default));
        }
        if column.identity {
            parts.push(self.identity_clause().to_string());
        }
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        match &column.primary_key {
            Some(Some(name)) => parts.push(format!("CONSTRAINT {} PRIMARY KEY", self.quote_identifier(name))),
            Some(None) => parts.push("PRIMARY KEY".to_string()),
            None => {}
        }
        if column.unique {
            parts.push("UNIQUE".to_string());
        }
        if let Some(fk) = &column.foreign_key {
            parts.push(self.render_reference(fk));
        }

        Ok(parts.join(" "))
    }

    /// Render a `REFERENCES` clause
    fn render_reference(&self, fk: &ForeignKeyReference) -> String {
        let mut sql = format!(
            "REFERENCES {} ({})",
            self.quote_identifier(&fk.table),
            self.quote_identifier(&fk.column)
        );
        if fk.on_delete != ReferentialAction::NoAction {
            sql.push_str(&format!(" ON DELETE {}", fk.on_delete.as_sql()));
        }
        sql
    }

    /// Render a table-level constraint
    fn render_constraint(&self, constraint: &TableConstraint) -> String {
        let prefix = constraint
            .name()
            .map(|name| format!("CONSTRAINT {} ", self.quote_identifier(name)))
            .unwrap_or_default();
        let body = match constraint {
            TableConstraint::PrimaryKey { columns, .. } => {
                format!("PRIMARY KEY ({})", self.quote_list(columns))
            }
            TableConstraint::Unique { columns, .. } => format!("UNIQUE ({})", self.quote_list(columns)),
            TableConstraint::ForeignKey { column, references, .. } => format!(
                "FOREIGN KEY ({}) {}",
                self.quote_identifier(column),
                self.render_reference(references)
            ),
        };
        format!("{}{}", prefix, body)
    }

    /// Quote and comma-join identifiers
    fn quote_list(&self, identifiers: &[String]) -> String {
        identifiers
            .iter()
            .map(|identifier| self.quote_identifier(identifier))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Placeholders for `count` parameters starting at `start`
    fn placeholders(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|index| self.parameter_placeholder(index))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Add paging to a SELECT statement
    fn paginate(&self, select: &str, offset: u64, limit: u64) -> String {
        format!("{} LIMIT {} OFFSET {}", select.trim_end(), limit, offset)
    }

    /// Query returning a row when `table` exists, none otherwise
    fn table_exists_query(&self, table: &str) -> SqlStatement {
        SqlStatement::with_params(
            format!(
                "SELECT '1' FROM information_schema.tables WHERE table_name = {}",
                self.parameter_placeholder(0)
            ),
            vec![DatabaseValue::from(table)],
        )
    }

    /// Render an insert-or-update statement.
    ///
    /// Parameters are bound in the order of `columns`; `key_columns` must be
    /// a subset of `columns`.
    fn render_upsert(&self, table: &str, key_columns: &[&str], columns: &[&str]) -> MigrationResult<String>;

    /// Render an expression into the statements that implement it
    fn render(&self, expression: &Expression) -> MigrationResult<Vec<SqlStatement>> {
        match expression {
            Expression::AddColumn(e) => self.render_add_column(e),
            Expression::AlterColumn(e) => {
                if !self.supports(Feature::AlterColumn) {
                    return Err(MigrationError::unsupported(self.kind(), Feature::AlterColumn.to_string()));
                }
                self.render_alter_column(e)
            }
            Expression::CreateTable(e) => self.render_create_table(e),
            Expression::CreateIndex(e) => {
                if e.filter.is_some() && !self.supports(Feature::FilteredIndexes) {
                    return Err(MigrationError::unsupported(self.kind(), Feature::FilteredIndexes.to_string()));
                }
                self.render_create_index(e)
            }
            Expression::DropTable(e) => self.render_drop_table(e),
            Expression::DropColumn(e) => {
                if !self.supports(Feature::DropColumn) {
                    return Err(MigrationError::unsupported(self.kind(), Feature::DropColumn.to_string()));
                }
                self.render_drop_column(e)
            }
            Expression::DropIndex(e) => self.render_drop_index(e),
            Expression::DropDefaultConstraint(e) => {
                if !self.supports(Feature::DropDefaultConstraint) {
                    return Err(MigrationError::unsupported(
                        self.kind(),
                        Feature::DropDefaultConstraint.to_string(),
                    ));
                }
                self.render_drop_default_constraint(e)
            }
            Expression::RawSql(e) => Ok(vec![SqlStatement::with_params(e.sql.clone(), e.params.clone())]),
            Expression::InsertRow(e) => self.render_insert(e),
            Expression::UpdateRows(e) => self.render_update(e),
            Expression::RenameColumn(e) => {
                if !self.supports(Feature::RenameColumn) {
                    return Err(MigrationError::unsupported(self.kind(), Feature::RenameColumn.to_string()));
                }
                self.render_rename_column(e)
            }
            Expression::RenameTable(e) => self.render_rename_table(e),
        }
    }

    fn render_add_column(&self, e: &AddColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(&e.table),
            self.render_column(&e.table, &e.column)?
        ))])
    }

    fn render_alter_column(&self, e: &AlterColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        let table = self.quote_identifier(&e.table);
        let column = self.quote_identifier(&e.column.name);
        let mut statements = vec![SqlStatement::new(format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE {}",
            table,
            column,
            self.column_type(&e.column.column_type)
        ))];
        statements.push(SqlStatement::new(format!(
            "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
            table,
            column,
            if e.column.nullable { "DROP" } else { "SET" }
        )));
        statements.push(SqlStatement::new(match &e.column.default {
            Some(default) => format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                table,
                column,
                self.render_default_value(default)
            ),
            None => format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", table, column),
        }));
        Ok(statements)
    }

    fn render_create_table(&self, e: &CreateTableExpression) -> MigrationResult<Vec<SqlStatement>> {
        let mut parts = Vec::with_capacity(e.columns.len() + e.constraints.len());
        for column in &e.columns {
            parts.push(self.render_column(&e.table, column)?);
        }
        for constraint in &e.constraints {
            parts.push(self.render_constraint(constraint));
        }

        Ok(vec![SqlStatement::new(format!(
            "CREATE TABLE {}{} (\n    {}\n)",
            if e.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(&e.table),
            parts.join(",\n    ")
        ))])
    }

    fn render_create_index(&self, e: &CreateIndexExpression) -> MigrationResult<Vec<SqlStatement>> {
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if e.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&e.name),
            self.quote_identifier(&e.table),
            self.quote_list(&e.columns)
        );
        if let Some(filter) = &e.filter {
            sql.push_str(&format!(" WHERE {}", filter));
        }
        Ok(vec![SqlStatement::new(sql)])
    }

    fn render_drop_table(&self, e: &DropTableExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "DROP TABLE {}{}",
            if e.if_exists { "IF EXISTS " } else { "" },
            self.quote_identifier(&e.table)
        ))])
    }

    fn render_drop_column(&self, e: &DropColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        let table = self.quote_identifier(&e.table);
        Ok(e.columns
            .iter()
            .map(|column| {
                SqlStatement::new(format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    table,
                    self.quote_identifier(column)
                ))
            })
            .collect())
    }

    fn render_drop_index(&self, e: &DropIndexExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!("DROP INDEX {}", self.quote_identifier(&e.name)))])
    }

    fn render_drop_default_constraint(
        &self,
        e: &DropDefaultConstraintExpression,
    ) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
            self.quote_identifier(&e.table),
            self.quote_identifier(&e.column)
        ))])
    }

    fn render_insert(&self, e: &InsertRowExpression) -> MigrationResult<Vec<SqlStatement>> {
        let table = self.quote_identifier(&e.table);
        Ok(e.rows
            .iter()
            .map(|row| {
                let columns: Vec<String> = row.iter().map(|(column, _)| column.clone()).collect();
                SqlStatement::with_params(
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        table,
                        self.quote_list(&columns),
                        self.placeholders(0, row.len())
                    ),
                    row.iter().map(|(_, value)| value.clone()).collect(),
                )
            })
            .collect())
    }

    fn render_update(&self, e: &UpdateRowsExpression) -> MigrationResult<Vec<SqlStatement>> {
        let mut params = Vec::new();
        let mut assignments = Vec::with_capacity(e.assignments.len());
        for (column, value) in &e.assignments {
            assignments.push(format!(
                "{} = {}",
                self.quote_identifier(column),
                self.parameter_placeholder(params.len())
            ));
            params.push(value.clone());
        }

        let mut sql = format!("UPDATE {} SET {}", self.quote_identifier(&e.table), assignments.join(", "));

        if !e.conditions.is_empty() {
            let mut conditions = Vec::with_capacity(e.conditions.len());
            for (column, value) in &e.conditions {
                if value.is_null() {
                    conditions.push(format!("{} IS NULL", self.quote_identifier(column)));
                } else {
                    conditions.push(format!(
                        "{} = {}",
                        self.quote_identifier(column),
                        self.parameter_placeholder(params.len())
                    ));
                    params.push(value.clone());
                }
            }
            sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }

        Ok(vec![SqlStatement::with_params(sql, params)])
    }

    fn render_rename_column(&self, e: &RenameColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(&e.table),
            self.quote_identifier(&e.old_name),
            self.quote_identifier(&e.new_name)
        ))])
    }

    fn render_rename_table(&self, e: &RenameTableExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(&e.old_name),
            self.quote_identifier(&e.new_name)
        ))])
    }
}

/// Check the arguments shared by every upsert renderer and return the
/// non-key columns
pub(crate) fn upsert_update_columns<'a>(
    table: &str,
    key_columns: &[&'a str],
    columns: &[&'a str],
) -> MigrationResult<Vec<&'a str>> {
    if table.trim().is_empty() {
        return Err(MigrationError::validation(ValidationKind::MissingTable, "upsert table name is required"));
    }
    if key_columns.is_empty() {
        return Err(MigrationError::validation(
            ValidationKind::NoColumns,
            format!("upsert into '{}' needs at least one key column", table),
        ));
    }
    if let Some(missing) = key_columns.iter().find(|key| !columns.contains(key)) {
        return Err(MigrationError::validation(
            ValidationKind::MissingColumn,
            format!("upsert key column '{}' is not among the inserted columns", missing),
        ));
    }
    Ok(columns.iter().copied().filter(|c| !key_columns.contains(c)).collect())
}
