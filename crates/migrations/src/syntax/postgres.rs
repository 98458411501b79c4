//! PostgreSQL syntax

use super::{quote_string, upsert_update_columns, Feature, SqlStatement, SqlSyntaxProvider};
use crate::backends::{DatabaseValue, DialectKind};
use crate::error::MigrationResult;
use crate::expressions::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSyntax;

impl SqlSyntaxProvider for PostgresSyntax {
    fn kind(&self) -> DialectKind {
        DialectKind::PostgreSQL
    }

    fn column_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Text { length: Some(length) } => format!("VARCHAR({})", length),
            ColumnType::Text { length: None } => "TEXT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::DateTime => "TIMESTAMPTZ".to_string(),
            ColumnType::Binary => "BYTEA".to_string(),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
            ColumnType::Guid => "UUID".to_string(),
        }
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn supports(&self, feature: Feature) -> bool {
        !matches!(feature, Feature::IdentityInsert)
    }

    fn current_timestamp(&self) -> &'static str {
        "NOW()"
    }

    fn render_literal(&self, value: &DatabaseValue) -> String {
        match value {
            DatabaseValue::Bytes(b) => format!("'\\x{}'::bytea", hex::encode(b)),
            DatabaseValue::Uuid(u) => format!("'{}'::uuid", u),
            DatabaseValue::Json(j) => format!("{}::jsonb", quote_string(&j.to_string())),
            DatabaseValue::DateTime(dt) => format!("'{}'::timestamptz", dt.to_rfc3339()),
            DatabaseValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            DatabaseValue::Null => "NULL".to_string(),
            DatabaseValue::Int32(i) => i.to_string(),
            DatabaseValue::Int64(i) => i.to_string(),
            DatabaseValue::Float64(f) => f.to_string(),
            DatabaseValue::Decimal(d) => d.clone(),
            DatabaseValue::String(s) => quote_string(s),
        }
    }

    /// One statement changing type, nullability and default together
    fn render_alter_column(&self, e: &AlterColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        let column = self.quote_identifier(&e.column.name);
        let type_name = self.column_type(&e.column.column_type);
        let mut actions = vec![format!(
            "ALTER COLUMN {0} TYPE {1} USING {0}::{1}",
            column, type_name
        )];
        actions.push(format!(
            "ALTER COLUMN {} {} NOT NULL",
            column,
            if e.column.nullable { "DROP" } else { "SET" }
        ));
        actions.push(match &e.column.default {
            Some(default) => format!("ALTER COLUMN {} SET DEFAULT {}", column, self.render_default_value(default)),
            None => format!("ALTER COLUMN {} DROP DEFAULT", column),
        });

        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(&e.table),
            actions.join(", ")
        ))])
    }

    fn render_drop_column(&self, e: &DropColumnExpression) -> MigrationResult<Vec<SqlStatement>> {
        let drops = e
            .columns
            .iter()
            .map(|column| format!("DROP COLUMN {}", self.quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(vec![SqlStatement::new(format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(&e.table),
            drops
        ))])
    }

    fn table_exists_query(&self, table: &str) -> SqlStatement {
        SqlStatement::with_params(
            "SELECT '1' FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1",
            vec![DatabaseValue::from(table)],
        )
    }

    fn render_upsert(&self, table: &str, key_columns: &[&str], columns: &[&str]) -> MigrationResult<String> {
        let update_columns = upsert_update_columns(table, key_columns, columns)?;
        let column_list = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let keys = key_columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");

        let action = if update_columns.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!(
                "DO UPDATE SET {}",
                update_columns
                    .iter()
                    .map(|c| format!("{0} = EXCLUDED.{0}", self.quote_identifier(c)))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            self.quote_identifier(table),
            column_list,
            self.placeholders(0, columns.len()),
            keys,
            action
        ))
    }
}
