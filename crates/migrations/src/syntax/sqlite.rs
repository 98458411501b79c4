//! SQLite syntax

use super::{upsert_update_columns, Feature, SqlStatement, SqlSyntaxProvider};
use crate::backends::{DatabaseValue, DialectKind};
use crate::error::{MigrationError, MigrationResult};
use crate::expressions::*;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteSyntax;

impl SqlSyntaxProvider for SqliteSyntax {
    fn kind(&self) -> DialectKind {
        DialectKind::SQLite
    }

    fn column_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Text { .. } | ColumnType::DateTime | ColumnType::Guid => "TEXT".to_string(),
            ColumnType::Integer | ColumnType::BigInteger | ColumnType::Boolean => "INTEGER".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Decimal { .. } => "NUMERIC".to_string(),
        }
    }

    fn parameter_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn supports(&self, feature: Feature) -> bool {
        !matches!(
            feature,
            Feature::AlterColumn | Feature::DropDefaultConstraint | Feature::IdentityInsert
        )
    }

    fn render_literal(&self, value: &DatabaseValue) -> String {
        match value {
            DatabaseValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            DatabaseValue::Null => "NULL".to_string(),
            DatabaseValue::Int32(i) => i.to_string(),
            DatabaseValue::Int64(i) => i.to_string(),
            DatabaseValue::Float64(f) => f.to_string(),
            DatabaseValue::Decimal(d) => d.clone(),
            DatabaseValue::String(s) => super::quote_string(s),
            DatabaseValue::Bytes(b) => format!("X'{}'", hex::encode_upper(b)),
            DatabaseValue::Uuid(u) => super::quote_string(&u.to_string()),
            DatabaseValue::DateTime(dt) => super::quote_string(&dt.to_rfc3339()),
            DatabaseValue::Json(j) => super::quote_string(&j.to_string()),
        }
    }

    /// Identity columns become `INTEGER PRIMARY KEY AUTOINCREMENT`, the only
    /// auto-increment form SQLite has
    fn render_column(&self, table: &str, column: &ColumnDefinition) -> MigrationResult<String> {
        if column.identity && !column.is_primary_key() {
            return Err(MigrationError::unsupported(
                self.kind(),
                format!("identity column '{}' that is not the inline primary key", column.name),
            ));
        }

        let type_name = if column.identity {
            "INTEGER".to_string()
        } else {
            self.column_type(&column.column_type)
        };
        let mut parts = vec![self.quote_identifier(&column.name), type_name];

        if let Some(expression) = &column.computed {
            parts.push(format!("GENERATED ALWAYS AS ({}) VIRTUAL", expression));
        }
        if let Some(default) = &column.default {
            parts.push(self.render_default(table, &column.name, default));
        }
        parts.push(if column.nullable { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(name) = &column.primary_key {
            if let Some(name) = name {
                parts.push(format!("CONSTRAINT {}", self.quote_identifier(name)));
            }
            parts.push("PRIMARY KEY".to_string());
            if column.identity {
                parts.push("AUTOINCREMENT".to_string());
            }
        }
        if column.unique {
            parts.push("UNIQUE".to_string());
        }
        if let Some(fk) = &column.foreign_key {
            parts.push(self.render_reference(fk));
        }

        Ok(parts.join(" "))
    }

    fn table_exists_query(&self, table: &str) -> SqlStatement {
        SqlStatement::with_params(
            "SELECT '1' FROM sqlite_master WHERE type = 'table' AND name = ?",
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
                    .map(|c| format!("{0} = excluded.{0}", self.quote_identifier(c)))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
            self.quote_identifier(table),
            column_list,
            self.placeholders(0, columns.len()),
            keys,
            action
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_exists_reads_sqlite_master() {
        let query = SqliteSyntax.table_exists_query("elif_migration_state");
        assert_eq!(query.sql, "SELECT '1' FROM sqlite_master WHERE type = 'table' AND name = ?");
        assert_eq!(query.params, vec![DatabaseValue::from("elif_migration_state")]);
    }

    #[test]
    fn test_identity_primary_key_uses_autoincrement() {
        let sql = SqliteSyntax.render_column("users", &ColumnDefinition::id("id")).unwrap();
        assert_eq!(sql, "\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT");

        let big = ColumnDefinition::big_integer("id").identity().primary_key();
        assert_eq!(
            SqliteSyntax.render_column("users", &big).unwrap(),
            "\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT"
        );
    }

    #[test]
    fn test_identity_without_primary_key_is_unsupported() {
        let column = ColumnDefinition::integer("seq").identity();
        assert!(matches!(
            SqliteSyntax.render_column("t", &column),
            Err(MigrationError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_alter_column_is_unsupported() {
        let expr = Expression::AlterColumn(AlterColumnExpression {
            table: "users".into(),
            column: ColumnDefinition::text("name"),
        });
        let err = SqliteSyntax.render(&expr).unwrap_err();
        assert_eq!(err.to_string(), "The sqlite dialect does not support altering columns");
    }

    #[test]
    fn test_boolean_literal_and_upsert() {
        assert_eq!(SqliteSyntax.render_literal(&DatabaseValue::Bool(true)), "1");
        assert_eq!(
            SqliteSyntax.render_upsert("kv", &["k"], &["k", "v"]).unwrap(),
            "INSERT INTO \"kv\" (\"k\", \"v\") VALUES (?, ?) ON CONFLICT(\"k\") DO UPDATE SET \"v\" = excluded.\"v\""
        );
    }

    #[test]
    fn test_rename_and_drop_index() {
        let rename = Expression::RenameTable(RenameTableExpression {
            old_name: "old".into(),
            new_name: "new".into(),
        });
        assert_eq!(SqliteSyntax.render(&rename).unwrap()[0].sql, "ALTER TABLE \"old\" RENAME TO \"new\"");

        let drop = Expression::DropIndex(DropIndexExpression {
            name: "ix".into(),
            table: Some("t".into()),
        });
        assert_eq!(SqliteSyntax.render(&drop).unwrap()[0].sql, "DROP INDEX \"ix\"");
    }
}
