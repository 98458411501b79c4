//! SQL Server (T-SQL) syntax

use super::{upsert_update_columns, Feature, SqlStatement, SqlSyntaxProvider};
use crate::backends::{DatabaseValue, DialectKind};
use crate::error::{MigrationError, MigrationResult, ValidationKind};
use crate::expressions::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerSyntax;

/// `N'..'` unicode string literal
fn unicode_string(value: &str) -> String {
    format!("N'{}'", value.replace('\'', "''"))
}

/// Default constraints are named so they can be dropped later
fn default_constraint_name(table: &str, column: &str) -> String {
    format!("DF_{}_{}", table, column)
}

impl SqlServerSyntax {
    /// Batch that drops whatever default constraint is bound to a column
    fn drop_default_batch(&self, table: &str, column: &str) -> String {
        format!(
            "DECLARE @constraint sysname; \
             SELECT @constraint = dc.name FROM sys.default_constraints dc \
             JOIN sys.columns c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id \
             WHERE dc.parent_object_id = OBJECT_ID({}) AND c.name = {}; \
             IF @constraint IS NOT NULL EXEC(N'ALTER TABLE {} DROP CONSTRAINT [' + @constraint + N']')",
            unicode_string(table),
            unicode_string(column),
            self.quote_identifier(table).replace('\'', "''")
        )
    }
}

impl SqlSyntaxProvider for SqlServerSyntax {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn column_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Text { length: Some(length) } if *length <= 4000 => format!("NVARCHAR({})", length),
            ColumnType::Text { .. } => "NVARCHAR(MAX)".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean => "BIT".to_string(),
            ColumnType::DateTime => "DATETIME2".to_string(),
            ColumnType::Binary => "VARBINARY(MAX)".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            ColumnType::Guid => "UNIQUEIDENTIFIER".to_string(),
        }
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        format!("@p{}", index + 1)
    }

    fn supports(&self, _feature: Feature) -> bool {
        true
    }

    fn current_timestamp(&self) -> &'static str {
        "GETUTCDATE()"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        format!("[{}]", identifier.replace(']', "]]"))
    }

    fn identity_clause(&self) -> &'static str {
        "IDENTITY(1,1)"
    }

    fn render_literal(&self, value: &DatabaseValue) -> String {
        match value {
            DatabaseValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            DatabaseValue::String(s) => unicode_string(s),
            DatabaseValue::Bytes(b) => format!("0x{}", hex::encode_upper(b)),
            DatabaseValue::Json(j) => unicode_string(&j.to_string()),
            DatabaseValue::Uuid(u) => format!("'{}'", u),
            DatabaseValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            DatabaseValue::Null => "NULL".to_string(),
            DatabaseValue::Int32(i) => i.to_string(),
            DatabaseValue::Int64(i) => i.to_string(),
            DatabaseValue::Float64(f) => f.to_string(),
            DatabaseValue::Decimal(d) => d.clone(),
        }
    }

    fn render_default(&self, table: &str, column: &str, default: &ColumnDefault) -> String {
        format!(
            "CONSTRAINT {} DEFAULT {}",
            self.quote_identifier(&default_constraint_name(table, column)),
            self.render_default_value(default)
        )
    }

    /// Computed columns carry no type in T-SQL
    fn render_column(&self, table: &str, column: &ColumnDefinition) -> MigrationResult<String> {
        if let Some(expression) = &column.computed {
            return Ok(format!(
                "{} AS ({}) PERSISTED",
                self.quote_identifier(&column.name),
                expression
            ));
        }

        let mut parts = vec![self.quote_identifier(&column.name), self.column_type(&column.column_type)];
        if column.identity {
            parts.push(self.identity_clause().to_string());
        }
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = &column.default {
            parts.push(self.render_default(table, &column.name, default));
        }
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

    fn paginate(&self, select: &str, offset: u64, limit: u64) -> String {
        let select = select.trim_end();
        let order = if select.to_uppercase().contains("ORDER BY") {
            ""
        } else {
            " ORDER BY (SELECT NULL)"
        };
        format!(
            "{}{} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            select, order, offset, limit
        )
    }

    fn render_upsert(&self, table: &str, key_columns: &[&str], columns: &[&str]) -> MigrationResult<String> {
        let update_columns = upsert_update_columns(table, key_columns, columns)?;
        let source_columns = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let on = key_columns
            .iter()
            .map(|c| format!("target.{0} = source.{0}", self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(" AND ");

        let mut sql = format!(
            "MERGE INTO {} WITH (HOLDLOCK) AS target USING (VALUES ({})) AS source ({}) ON {}",
            self.quote_identifier(table),
            self.placeholders(0, columns.len()),
            source_columns,
            on
        );
        if !update_columns.is_empty() {
            let set = update_columns
                .iter()
                .map(|c| format!("target.{0} = source.{0}", self.quote_identifier(c)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {}", set));
        }
        let values = columns
            .iter()
            .map(|c| format!("source.{}", self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        // MERGE must be terminated
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({});",
            source_columns, values
        ));
        Ok(sql)
    }

    fn render_add_column(&self, e: &AddColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(&e.table),
            self.render_column(&e.table, &e.column)?
        ))])
    }

    fn render_alter_column(&self, e: &AlterColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        let table = self.quote_identifier(&e.table);
        let mut statements = vec![
            SqlStatement::new(self.drop_default_batch(&e.table, &e.column.name)),
            SqlStatement::new(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} {}",
                table,
                self.quote_identifier(&e.column.name),
                self.column_type(&e.column.column_type),
                if e.column.nullable { "NULL" } else { "NOT NULL" }
            )),
        ];
        if let Some(default) = &e.column.default {
            statements.push(SqlStatement::new(format!(
                "ALTER TABLE {} ADD {} FOR {}",
                table,
                self.render_default(&e.table, &e.column.name, default),
                self.quote_identifier(&e.column.name)
            )));
        }
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

        let create = format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_identifier(&e.table),
            parts.join(",\n    ")
        );
        let sql = if e.if_not_exists {
            format!("IF OBJECT_ID({}, N'U') IS NULL\n{}", unicode_string(&e.table), create)
        } else {
            create
        };
        Ok(vec![SqlStatement::new(sql)])
    }

    fn render_create_index(&self, e: &CreateIndexExpression) -> MigrationResult<Vec<SqlStatement>> {
        let mut sql = format!(
            "CREATE {}NONCLUSTERED INDEX {} ON {} ({})",
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

    fn render_drop_column(&self, e: &DropColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        // Bound default constraints block the drop
        let mut statements: Vec<SqlStatement> = e
            .columns
            .iter()
            .map(|column| SqlStatement::new(self.drop_default_batch(&e.table, column)))
            .collect();
        statements.push(SqlStatement::new(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(&e.table),
            self.quote_list(&e.columns)
        )));
        Ok(statements)
    }

    fn render_drop_index(&self, e: &DropIndexExpression) -> MigrationResult<Vec<SqlStatement>> {
        let table = e.table.as_deref().ok_or_else(|| {
            MigrationError::validation(
                ValidationKind::MissingTable,
                format!("dropping index '{}' needs its table on SQL Server", e.name),
            )
        })?;
        Ok(vec![SqlStatement::new(format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&e.name),
            self.quote_identifier(table)
        ))])
    }

    fn render_drop_default_constraint(
        &self,
        e: &DropDefaultConstraintExpression,
    ) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(self.drop_default_batch(&e.table, &e.column))])
    }

    fn render_insert(&self, e: &InsertRowExpression) -> MigrationResult<Vec<SqlStatement>> {
        let table = self.quote_identifier(&e.table);
        let mut statements = Vec::with_capacity(e.rows.len() + 2);
        if e.identity_insert {
            statements.push(SqlStatement::new(format!("SET IDENTITY_INSERT {} ON", table)));
        }
        for row in &e.rows {
            let columns: Vec<String> = row.iter().map(|(column, _)| column.clone()).collect();
            statements.push(SqlStatement::with_params(
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    self.quote_list(&columns),
                    self.placeholders(0, row.len())
                ),
                row.iter().map(|(_, value)| value.clone()).collect(),
            ));
        }
        if e.identity_insert {
            statements.push(SqlStatement::new(format!("SET IDENTITY_INSERT {} OFF", table)));
        }
        Ok(statements)
    }

    fn render_rename_column(&self, e: &RenameColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "EXEC sp_rename {}, {}, N'COLUMN'",
            unicode_string(&format!("{}.{}", e.table, e.old_name)),
            unicode_string(&e.new_name)
        ))])
    }

    fn render_rename_table(&self, e: &RenameTableExpression) -> MigrationResult<Vec<SqlStatement>> {
        Ok(vec![SqlStatement::new(format!(
            "EXEC sp_rename {}, {}",
            unicode_string(&e.old_name),
            unicode_string(&e.new_name)
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brackets_and_placeholders() {
        assert_eq!(SqlServerSyntax.quote_identifier("odd]name"), "[odd]]name]");
        assert_eq!(SqlServerSyntax.parameter_placeholder(0), "@p1");
        assert_eq!(SqlServerSyntax.render_literal(&DatabaseValue::from("Zoë")), "N'Zoë'");
    }

    #[test]
    fn test_create_table_names_default_constraints() {
        let expr = Expression::CreateTable(CreateTableExpression {
            table: "users".into(),
            columns: vec![
                ColumnDefinition::id("id"),
                ColumnDefinition::datetime("created_at").not_null().default_current_timestamp(),
            ],
            constraints: vec![],
            if_not_exists: true,
        });
        let sql = &SqlServerSyntax.render(&expr).unwrap()[0].sql;
        assert!(sql.starts_with("IF OBJECT_ID(N'users', N'U') IS NULL\nCREATE TABLE [users]"));
        assert!(sql.contains("[id] INT IDENTITY(1,1) NOT NULL PRIMARY KEY"));
        assert!(sql.contains("[created_at] DATETIME2 NOT NULL CONSTRAINT [DF_users_created_at] DEFAULT GETUTCDATE()"));
    }

    #[test]
    fn test_identity_insert_wraps_rows() {
        let expr = Expression::InsertRow(InsertRowExpression {
            table: "roles".into(),
            rows: vec![
                vec![("id".into(), 1i32.into()), ("name".into(), "admin".into())],
                vec![("id".into(), 2i32.into()), ("name".into(), "editor".into())],
            ],
            identity_insert: true,
        });
        let sql: Vec<String> = SqlServerSyntax.render(&expr).unwrap().into_iter().map(|s| s.sql).collect();
        assert_eq!(sql.len(), 4);
        assert_eq!(sql[0], "SET IDENTITY_INSERT [roles] ON");
        assert_eq!(sql[1], "INSERT INTO [roles] ([id], [name]) VALUES (@p1, @p2)");
        assert_eq!(sql[3], "SET IDENTITY_INSERT [roles] OFF");
    }

    #[test]
    fn test_renames_use_sp_rename() {
        let column = Expression::RenameColumn(RenameColumnExpression {
            table: "users".into(),
            old_name: "mail".into(),
            new_name: "email".into(),
        });
        assert_eq!(
            SqlServerSyntax.render(&column).unwrap()[0].sql,
            "EXEC sp_rename N'users.mail', N'email', N'COLUMN'"
        );
    }

    #[test]
    fn test_drop_index_requires_table() {
        let expr = Expression::DropIndex(DropIndexExpression { name: "ix".into(), table: None });
        assert!(matches!(
            SqlServerSyntax.render(&expr),
            Err(MigrationError::ExpressionValidation { kind: ValidationKind::MissingTable, .. })
        ));
    }

    #[test]
    fn test_paginate_adds_order_by() {
        assert_eq!(
            SqlServerSyntax.paginate("SELECT * FROM t", 0, 5),
            "SELECT * FROM t ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[test]
    fn test_drop_default_looks_up_constraint_name() {
        let expr = Expression::DropDefaultConstraint(DropDefaultConstraintExpression {
            table: "users".into(),
            column: "active".into(),
        });
        let sql = &SqlServerSyntax.render(&expr).unwrap()[0].sql;
        assert!(sql.contains("sys.default_constraints"));
        assert!(sql.contains("OBJECT_ID(N'users')"));
        assert!(sql.contains("c.name = N'active'"));
    }
}
