//! Column and constraint definitions shared by table expressions

use crate::backends::DatabaseValue;

/// Abstract column type, mapped to a concrete type name by each dialect
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// Variable-length text; `None` means unbounded
    Text { length: Option<u32> },
    Integer,
    BigInteger,
    Boolean,
    DateTime,
    Binary,
    Decimal { precision: u8, scale: u8 },
    Guid,
}

/// Default value of a column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Value(DatabaseValue),
    /// The dialect's current timestamp function
    CurrentTimestamp,
    /// Raw SQL expression, rendered as-is
    Raw(String),
}

/// Referential action on delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    NoAction,
    Cascade,
    SetNull,
}

impl ReferentialAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyReference {
    pub table: String,
    pub column: String,
    pub on_delete: ReferentialAction,
}

/// A single column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub identity: bool,
    /// Inline primary key, with an optional constraint name
    pub primary_key: Option<Option<String>>,
    pub unique: bool,
    /// Computed column expression
    pub computed: Option<String>,
    pub foreign_key: Option<ForeignKeyReference>,
}

impl ColumnDefinition {
    /// Create a nullable column of the given type
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: true,
            default: None,
            identity: false,
            primary_key: None,
            unique: false,
            computed: None,
            foreign_key: None,
        }
    }

    /// Unbounded text column
    pub fn text(name: &str) -> Self {
        Self::new(name, ColumnType::Text { length: None })
    }

    /// Bounded text column
    pub fn string(name: &str, length: u32) -> Self {
        Self::new(name, ColumnType::Text { length: Some(length) })
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn big_integer(name: &str) -> Self {
        Self::new(name, ColumnType::BigInteger)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn datetime(name: &str) -> Self {
        Self::new(name, ColumnType::DateTime)
    }

    pub fn binary(name: &str) -> Self {
        Self::new(name, ColumnType::Binary)
    }

    pub fn decimal(name: &str, precision: u8, scale: u8) -> Self {
        Self::new(name, ColumnType::Decimal { precision, scale })
    }

    pub fn guid(name: &str) -> Self {
        Self::new(name, ColumnType::Guid)
    }

    /// Auto-incrementing integer primary key
    pub fn id(name: &str) -> Self {
        Self::integer(name).identity().primary_key()
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default_value<T: Into<DatabaseValue>>(mut self, value: T) -> Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    pub fn default_current_timestamp(mut self) -> Self {
        self.default = Some(ColumnDefault::CurrentTimestamp);
        self
    }

    pub fn default_raw(mut self, expression: &str) -> Self {
        self.default = Some(ColumnDefault::Raw(expression.to_string()));
        self
    }

    /// Identity columns are never nullable
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = Some(None);
        self.nullable = false;
        self
    }

    pub fn primary_key_named(mut self, constraint: &str) -> Self {
        self.primary_key = Some(Some(constraint.to_string()));
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn computed(mut self, expression: &str) -> Self {
        self.computed = Some(expression.to_string());
        self
    }

    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.foreign_key = Some(ForeignKeyReference {
            table: table.to_string(),
            column: column.to_string(),
            on_delete: ReferentialAction::NoAction,
        });
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let Some(fk) = self.foreign_key.as_mut() {
            fk.on_delete = action;
        }
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key.is_some()
    }
}

/// Table-level constraint
#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        column: String,
        references: ForeignKeyReference,
    },
}

impl TableConstraint {
    pub fn name(&self) -> Option<&str> {
        match self {
            TableConstraint::PrimaryKey { name, .. }
            | TableConstraint::Unique { name, .. }
            | TableConstraint::ForeignKey { name, .. } => name.as_deref(),
        }
    }

    /// Columns of this table the constraint covers
    pub fn columns(&self) -> Vec<&str> {
        match self {
            TableConstraint::PrimaryKey { columns, .. } | TableConstraint::Unique { columns, .. } => {
                columns.iter().map(String::as_str).collect()
            }
            TableConstraint::ForeignKey { column, .. } => vec![column.as_str()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_column_is_identity_primary_key() {
        let column = ColumnDefinition::id("id");
        assert!(column.identity);
        assert!(column.is_primary_key());
        assert!(!column.nullable);
        assert_eq!(column.column_type, ColumnType::Integer);
    }

    #[test]
    fn test_references_with_cascade() {
        let column = ColumnDefinition::integer("user_id")
            .not_null()
            .references("users", "id")
            .on_delete(ReferentialAction::Cascade);
        let fk = column.foreign_key.unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.on_delete.as_sql(), "CASCADE");
    }

    #[test]
    fn test_on_delete_without_reference_is_ignored() {
        let column = ColumnDefinition::integer("x").on_delete(ReferentialAction::SetNull);
        assert!(column.foreign_key.is_none());
    }
}
