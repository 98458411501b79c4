//! Standard SQL syntax

use super::{upsert_update_columns, Feature, SqlSyntaxProvider};
use crate::backends::DialectKind;
use crate::error::MigrationResult;
use crate::expressions::ColumnType;

/// SQL standard syntax without engine extensions
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiSyntax;

impl SqlSyntaxProvider for AnsiSyntax {
    fn kind(&self) -> DialectKind {
        DialectKind::Ansi
    }

    fn column_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Text { length: Some(length) } => format!("VARCHAR({})", length),
            ColumnType::Text { length: None } => "CLOB".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::DateTime => "TIMESTAMP".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            ColumnType::Guid => "CHAR(36)".to_string(),
        }
    }

    fn parameter_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports(&self, feature: Feature) -> bool {
        // The target engine is unknown, so DDL is not assumed to roll back
        !matches!(
            feature,
            Feature::ComputedColumns | Feature::FilteredIndexes | Feature::IdentityInsert | Feature::TransactionalDdl
        )
    }

    fn paginate(&self, select: &str, offset: u64, limit: u64) -> String {
        format!(
            "{} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            select.trim_end(),
            offset,
            limit
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
            "MERGE INTO {} AS target USING (VALUES ({})) AS source ({}) ON {}",
            self.quote_identifier(table),
            self.placeholders(0, columns.len()),
            source_columns,
            on
        );
        if !update_columns.is_empty() {
            let set = update_columns
                .iter()
                .map(|c| format!("{0} = source.{0}", self.quote_identifier(c)))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" WHEN MATCHED THEN UPDATE SET {}", set));
        }
        let values = columns
            .iter()
            .map(|c| format!("source.{}", self.quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(
            " WHEN NOT MATCHED THEN INSERT ({}) VALUES ({})",
            source_columns, values
        ));
        Ok(sql)
    }
}
