//! Expression model
//!
//! An [`Expression`] describes one schema or data change before it is
//! rendered to SQL. Builders fill one in, the context validates it, the
//! dialect renders it and the rendered statements are executed.

pub mod column;

pub use column::*;

use std::collections::HashSet;

use crate::backends::DatabaseValue;
use crate::error::{MigrationError, MigrationResult, ValidationKind};

/// `ALTER TABLE .. ADD column`
#[derive(Debug, Clone, PartialEq)]
pub struct AddColumnExpression {
    pub table: String,
    pub column: ColumnDefinition,
}

/// `ALTER TABLE .. ALTER COLUMN`: change type, nullability or default
#[derive(Debug, Clone, PartialEq)]
pub struct AlterColumnExpression {
    pub table: String,
    pub column: ColumnDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableExpression {
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<TableConstraint>,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexExpression {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Predicate of a filtered (partial) index
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTableExpression {
    pub table: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropColumnExpression {
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropIndexExpression {
    pub name: String,
    /// Owning table, required by dialects that scope index names per table
    pub table: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropDefaultConstraintExpression {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSqlExpression {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

/// One or more rows inserted into a table, one statement per row
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRowExpression {
    pub table: String,
    pub rows: Vec<Vec<(String, DatabaseValue)>>,
    /// Allow explicit values for identity columns
    pub identity_insert: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRowsExpression {
    pub table: String,
    pub assignments: Vec<(String, DatabaseValue)>,
    /// Equality conditions joined with AND
    pub conditions: Vec<(String, DatabaseValue)>,
    /// Explicit opt-in to an update without conditions
    pub all_rows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameColumnExpression {
    pub table: String,
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenameTableExpression {
    pub old_name: String,
    pub new_name: String,
}

/// A single structured schema or data change
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    AddColumn(AddColumnExpression),
    AlterColumn(AlterColumnExpression),
    CreateTable(CreateTableExpression),
    CreateIndex(CreateIndexExpression),
    DropTable(DropTableExpression),
    DropColumn(DropColumnExpression),
    DropIndex(DropIndexExpression),
    DropDefaultConstraint(DropDefaultConstraintExpression),
    RawSql(RawSqlExpression),
    InsertRow(InsertRowExpression),
    UpdateRows(UpdateRowsExpression),
    RenameColumn(RenameColumnExpression),
    RenameTable(RenameTableExpression),
}

fn require_name(value: &str, kind: ValidationKind, what: &str) -> MigrationResult<()> {
    if value.trim().is_empty() {
        return Err(MigrationError::validation(kind, format!("{} name is required", what)));
    }
    Ok(())
}

fn validate_column(column: &ColumnDefinition) -> MigrationResult<()> {
    require_name(&column.name, ValidationKind::MissingColumn, "column")?;
    if let ColumnType::Decimal { precision, scale } = column.column_type {
        if precision == 0 || scale > precision {
            return Err(MigrationError::validation(
                ValidationKind::InvalidColumnType,
                format!(
                    "column '{}': decimal({}, {}) needs 0 < scale <= precision",
                    column.name, precision, scale
                ),
            ));
        }
    }
    if let ColumnType::Text { length: Some(0) } = column.column_type {
        return Err(MigrationError::validation(
            ValidationKind::InvalidColumnType,
            format!("column '{}': text length must be positive", column.name),
        ));
    }
    if let Some(fk) = &column.foreign_key {
        require_name(&fk.table, ValidationKind::MissingTable, "referenced table")?;
        require_name(&fk.column, ValidationKind::MissingColumn, "referenced column")?;
    }
    Ok(())
}

fn validate_assignments(pairs: &[(String, DatabaseValue)]) -> MigrationResult<()> {
    let mut seen = HashSet::new();
    for (column, _) in pairs {
        require_name(column, ValidationKind::MissingColumn, "column")?;
        if !seen.insert(column.as_str()) {
            return Err(MigrationError::validation(
                ValidationKind::DuplicateColumn,
                format!("column '{}' is assigned twice", column),
            ));
        }
    }
    Ok(())
}

impl Expression {
    /// Short name of the operation, used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::AddColumn(_) => "add column",
            Expression::AlterColumn(_) => "alter column",
            Expression::CreateTable(_) => "create table",
            Expression::CreateIndex(_) => "create index",
            Expression::DropTable(_) => "drop table",
            Expression::DropColumn(_) => "drop column",
            Expression::DropIndex(_) => "drop index",
            Expression::DropDefaultConstraint(_) => "drop default constraint",
            Expression::RawSql(_) => "raw sql",
            Expression::InsertRow(_) => "insert",
            Expression::UpdateRows(_) => "update",
            Expression::RenameColumn(_) => "rename column",
            Expression::RenameTable(_) => "rename table",
        }
    }

    /// Check that the expression is structurally complete
    pub fn validate(&self) -> MigrationResult<()> {
        match self {
            Expression::AddColumn(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                validate_column(&e.column)
            }
            Expression::AlterColumn(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                validate_column(&e.column)
            }
            Expression::CreateTable(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                if e.columns.is_empty() {
                    return Err(MigrationError::validation(
                        ValidationKind::NoColumns,
                        format!("table '{}' must have at least one column", e.table),
                    ));
                }
                let mut names = HashSet::new();
                for column in &e.columns {
                    validate_column(column)?;
                    if !names.insert(column.name.to_lowercase()) {
                        return Err(MigrationError::validation(
                            ValidationKind::DuplicateColumn,
                            format!("table '{}' defines column '{}' twice", e.table, column.name),
                        ));
                    }
                }
                let inline_keys = e.columns.iter().filter(|c| c.is_primary_key()).count();
                let table_keys = e
                    .constraints
                    .iter()
                    .filter(|c| matches!(c, TableConstraint::PrimaryKey { .. }))
                    .count();
                if inline_keys > 1 || table_keys > 1 || (inline_keys > 0 && table_keys > 0) {
                    return Err(MigrationError::validation(
                        ValidationKind::ConflictingPrimaryKey,
                        format!(
                            "table '{}' declares more than one primary key; use a composite key constraint",
                            e.table
                        ),
                    ));
                }
                for constraint in &e.constraints {
                    let columns = constraint.columns();
                    if columns.is_empty() {
                        return Err(MigrationError::validation(
                            ValidationKind::MissingColumn,
                            format!("constraint on table '{}' has no columns", e.table),
                        ));
                    }
                    for column in columns {
                        if !names.contains(&column.to_lowercase()) {
                            return Err(MigrationError::validation(
                                ValidationKind::MissingColumn,
                                format!("constraint references unknown column '{}'", column),
                            ));
                        }
                    }
                }
                Ok(())
            }
            Expression::CreateIndex(e) => {
                require_name(&e.name, ValidationKind::MissingIndex, "index")?;
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                if e.columns.is_empty() {
                    return Err(MigrationError::validation(
                        ValidationKind::NoColumns,
                        format!("index '{}' must cover at least one column", e.name),
                    ));
                }
                for column in &e.columns {
                    require_name(column, ValidationKind::MissingColumn, "column")?;
                }
                Ok(())
            }
            Expression::DropTable(e) => require_name(&e.table, ValidationKind::MissingTable, "table"),
            Expression::DropColumn(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                if e.columns.is_empty() {
                    return Err(MigrationError::validation(
                        ValidationKind::NoColumns,
                        format!("no column to drop from table '{}'", e.table),
                    ));
                }
                for column in &e.columns {
                    require_name(column, ValidationKind::MissingColumn, "column")?;
                }
                Ok(())
            }
            Expression::DropIndex(e) => {
                require_name(&e.name, ValidationKind::MissingIndex, "index")?;
                if let Some(table) = &e.table {
                    require_name(table, ValidationKind::MissingTable, "table")?;
                }
                Ok(())
            }
            Expression::DropDefaultConstraint(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                require_name(&e.column, ValidationKind::MissingColumn, "column")
            }
            Expression::RawSql(e) => {
                if e.sql.trim().is_empty() {
                    return Err(MigrationError::validation(ValidationKind::EmptySql, "SQL text is empty"));
                }
                Ok(())
            }
            Expression::InsertRow(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                if e.rows.is_empty() {
                    return Err(MigrationError::validation(
                        ValidationKind::NoRows,
                        format!("insert into '{}' has no rows", e.table),
                    ));
                }
                for row in &e.rows {
                    if row.is_empty() {
                        return Err(MigrationError::validation(
                            ValidationKind::NoRows,
                            format!("insert into '{}' contains an empty row", e.table),
                        ));
                    }
                    validate_assignments(row)?;
                }
                Ok(())
            }
            Expression::UpdateRows(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                if e.assignments.is_empty() {
                    return Err(MigrationError::validation(
                        ValidationKind::NoAssignments,
                        format!("update of '{}' sets no columns", e.table),
                    ));
                }
                validate_assignments(&e.assignments)?;
                if e.conditions.is_empty() && !e.all_rows {
                    return Err(MigrationError::validation(
                        ValidationKind::UnboundedUpdate,
                        format!("update of '{}' has no where clause; call all_rows() to update every row", e.table),
                    ));
                }
                for (column, _) in &e.conditions {
                    require_name(column, ValidationKind::MissingColumn, "column")?;
                }
                Ok(())
            }
            Expression::RenameColumn(e) => {
                require_name(&e.table, ValidationKind::MissingTable, "table")?;
                require_name(&e.old_name, ValidationKind::MissingColumn, "column")?;
                require_name(&e.new_name, ValidationKind::InvalidRename, "new column")?;
                if e.old_name == e.new_name {
                    return Err(MigrationError::validation(
                        ValidationKind::InvalidRename,
                        format!("column '{}' renamed to itself", e.old_name),
                    ));
                }
                Ok(())
            }
            Expression::RenameTable(e) => {
                require_name(&e.old_name, ValidationKind::MissingTable, "table")?;
                require_name(&e.new_name, ValidationKind::InvalidRename, "new table")?;
                if e.old_name == e.new_name {
                    return Err(MigrationError::validation(
                        ValidationKind::InvalidRename,
                        format!("table '{}' renamed to itself", e.old_name),
                    ));
                }
                Ok(())
            }
        }
    }
}
