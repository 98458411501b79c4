//! Migrator configuration
//!
//! Loaded from YAML, from `ELIF_MIGRATIONS_*` environment variables, or built
//! in code. Every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backends::DialectKind;
use crate::error::{MigrationError, MigrationResult};

/// Where transaction boundaries fall during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionScope {
    /// One transaction around the whole plan: all or nothing
    #[default]
    PerPlan,
    /// Commit after each migration unit
    PerMigration,
}

impl std::str::FromStr for TransactionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "per_plan" | "plan" => Ok(TransactionScope::PerPlan),
            "per_migration" | "migration" => Ok(TransactionScope::PerMigration),
            _ => Err(format!("Unknown transaction scope: {}", s)),
        }
    }
}

/// Migration runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    pub dialect: DialectKind,
    pub transaction_scope: TransactionScope,
    /// Table holding the recorded schema version
    pub version_table: String,
    /// Key of the version row in `version_table`
    pub version_key: String,
    /// Require minor and patch when parsing the recorded version
    pub strict_versions: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            transaction_scope: TransactionScope::default(),
            version_table: "elif_migration_state".to_string(),
            version_key: "schema_version".to_string(),
            strict_versions: false,
        }
    }
}

impl MigratorConfig {
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn with_transaction_scope(mut self, scope: TransactionScope) -> Self {
        self.transaction_scope = scope;
        self
    }

    pub fn with_version_table(mut self, table: &str) -> Self {
        self.version_table = table.to_string();
        self
    }

    pub fn from_yaml_str(content: &str) -> MigrationResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> MigrationResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Read `ELIF_MIGRATIONS_*` variables; unset ones keep their defaults
    pub fn from_env() -> MigrationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> MigrationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ELIF_MIGRATIONS_DIALECT") {
            config.dialect = value.parse().map_err(MigrationError::Configuration)?;
        }
        if let Some(value) = lookup("ELIF_MIGRATIONS_TRANSACTION_SCOPE") {
            config.transaction_scope = value.parse().map_err(MigrationError::Configuration)?;
        }
        if let Some(value) = lookup("ELIF_MIGRATIONS_VERSION_TABLE") {
            config.version_table = value;
        }
        if let Some(value) = lookup("ELIF_MIGRATIONS_VERSION_KEY") {
            config.version_key = value;
        }
        if let Some(value) = lookup("ELIF_MIGRATIONS_STRICT_VERSIONS") {
            config.strict_versions = value.trim().parse::<bool>().map_err(|_| {
                MigrationError::Configuration(format!(
                    "ELIF_MIGRATIONS_STRICT_VERSIONS must be true or false, got '{}'",
                    value
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MigrationResult<()> {
        let valid_table = !self.version_table.is_empty()
            && self
                .version_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_table {
            return Err(MigrationError::Configuration(format!(
                "Invalid version table name '{}'",
                self.version_table
            )));
        }
        if self.version_key.trim().is_empty() {
            return Err(MigrationError::Configuration(
                "Version key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MigratorConfig::default();
        assert_eq!(config.dialect, DialectKind::Ansi);
        assert_eq!(config.transaction_scope, TransactionScope::PerPlan);
        assert_eq!(config.version_table, "elif_migration_state");
        assert_eq!(config.version_key, "schema_version");
        assert!(!config.strict_versions);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = MigratorConfig::from_yaml_str("dialect: postgres\ntransaction_scope: per_migration\n").unwrap();
        assert_eq!(config.dialect, DialectKind::PostgreSQL);
        assert_eq!(config.transaction_scope, TransactionScope::PerMigration);
        assert_eq!(config.version_table, "elif_migration_state");
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let err = MigratorConfig::from_yaml_str("dialect: oracle").unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));

        let err = MigratorConfig::from_yaml_str("version_table: \"drop table; --\"").unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dialect: sqlite\nversion_table: app_state\nstrict_versions: true").unwrap();

        let config = MigratorConfig::load(file.path()).unwrap();
        assert_eq!(config.dialect, DialectKind::SQLite);
        assert_eq!(config.version_table, "app_state");
        assert!(config.strict_versions);
    }

    #[test]
    fn test_env_lookup() {
        let env: HashMap<&str, &str> = [
            ("ELIF_MIGRATIONS_DIALECT", "mssql"),
            ("ELIF_MIGRATIONS_TRANSACTION_SCOPE", "per-migration"),
            ("ELIF_MIGRATIONS_STRICT_VERSIONS", "true"),
        ]
        .into_iter()
        .collect();

        let config = MigratorConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.dialect, DialectKind::SqlServer);
        assert_eq!(config.transaction_scope, TransactionScope::PerMigration);
        assert!(config.strict_versions);
        assert_eq!(config.version_key, "schema_version");
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let err = MigratorConfig::from_lookup(|key| {
            (key == "ELIF_MIGRATIONS_STRICT_VERSIONS").then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
    }
}
