//! Database Backend Abstractions
//!
//! Connection providers the migration runner executes against, plus the
//! enumeration of SQL dialects a migration can be rendered for.

pub mod core;
pub mod postgres;
pub mod sqlite;

use serde::{Deserialize, Serialize};

// Re-export core traits and types
pub use self::core::*;
pub use postgres::{PostgresPool, PostgresTransaction};
pub use sqlite::{SqlitePool, SqliteTransaction};

/// SQL dialect enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// Plain SQL standard syntax, no engine extensions
    #[default]
    Ansi,
    #[serde(alias = "postgres")]
    PostgreSQL,
    SQLite,
    #[serde(alias = "mssql")]
    SqlServer,
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectKind::Ansi => write!(f, "ansi"),
            DialectKind::PostgreSQL => write!(f, "postgresql"),
            DialectKind::SQLite => write!(f, "sqlite"),
            DialectKind::SqlServer => write!(f, "sqlserver"),
        }
    }
}

impl std::str::FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ansi" | "sql" => Ok(DialectKind::Ansi),
            "postgresql" | "postgres" => Ok(DialectKind::PostgreSQL),
            "sqlite" => Ok(DialectKind::SQLite),
            "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            _ => Err(format!("Unsupported SQL dialect: {}", s)),
        }
    }
}

impl DialectKind {
    /// Detect the dialect from a database URL
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Some(DialectKind::PostgreSQL)
        } else if url.starts_with("sqlite:") || url.starts_with("file:") {
            Some(DialectKind::SQLite)
        } else if url.starts_with("mssql://") || url.starts_with("sqlserver://") {
            Some(DialectKind::SqlServer)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_parsing() {
        assert_eq!("postgres".parse::<DialectKind>(), Ok(DialectKind::PostgreSQL));
        assert_eq!("SQLite".parse::<DialectKind>(), Ok(DialectKind::SQLite));
        assert_eq!("mssql".parse::<DialectKind>(), Ok(DialectKind::SqlServer));
        assert!("oracle".parse::<DialectKind>().is_err());
        assert_eq!(DialectKind::SqlServer.to_string(), "sqlserver");
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(DialectKind::from_url("postgres://localhost/app"), Some(DialectKind::PostgreSQL));
        assert_eq!(DialectKind::from_url("sqlite::memory:"), Some(DialectKind::SQLite));
        assert_eq!(DialectKind::from_url("mysql://localhost"), None);
    }
}
