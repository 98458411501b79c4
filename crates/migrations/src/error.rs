//! Error types for the migration system
//!
//! Every failure that can abort a migration run is a variant of
//! [`MigrationError`]. Version parsing has its own [`FormatError`] so that
//! [`SemVersion`](crate::semver::SemVersion) stays usable on its own.

use std::error::Error as StdError;
use thiserror::Error;

use crate::semver::SemVersion;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Boxed driver error kept as the source of an execution failure
pub type DriverError = Box<dyn StdError + Send + Sync + 'static>;

/// Malformed version text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The text does not match the version grammar at all
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    /// Strict parsing requires a minor component
    #[error("invalid version '{0}': no minor version given in strict mode")]
    MissingMinor(String),
    /// Strict parsing requires a patch component
    #[error("invalid version '{0}': no patch version given in strict mode")]
    MissingPatch(String),
    /// A numeric component does not fit
    #[error("invalid version '{version}': component '{component}' is out of range")]
    OutOfRange { version: String, component: String },
}

/// Which part of an expression failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    MissingTable,
    MissingColumn,
    MissingIndex,
    NoColumns,
    DuplicateColumn,
    ConflictingPrimaryKey,
    InvalidColumnType,
    NoRows,
    NoAssignments,
    UnboundedUpdate,
    EmptySql,
    InvalidRename,
}

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Malformed version text
    #[error("Version format error: {0}")]
    Format(#[from] FormatError),

    /// An expression was started while another one was still being built,
    /// or a migration finished with an expression that never ran
    #[error("Incomplete expression: {0}")]
    IncompleteExpression(String),

    /// An expression was finalized with a structurally incomplete configuration
    #[error("Invalid expression ({kind:?}): {message}")]
    ExpressionValidation { kind: ValidationKind, message: String },

    /// The connection rejected a rendered statement
    #[error("Failed to execute statement `{statement}`: {source}")]
    Execution {
        statement: String,
        #[source]
        source: DriverError,
    },

    /// Two migrations target the same version
    #[error("Duplicate migration version: {0}")]
    DuplicateVersion(SemVersion),

    /// The selected dialect cannot render an expression
    #[error("The {dialect} dialect does not support {feature}")]
    Unsupported { dialect: String, feature: String },

    /// Connection could not be obtained or used
    #[error("Connection error: {0}")]
    Connection(String),

    /// Begin, commit or rollback failed
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Invalid migrator configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A post-commit collaborator failed
    #[error("Post-migration signal failed: {0}")]
    Signal(String),

    /// A migration unit failed and its transaction was rolled back.
    ///
    /// `applied` lists the units committed earlier in the same run, which is
    /// only ever non-empty with a per-migration transaction scope. Their
    /// signals are still sent; a signal failure at that point is logged.
    #[error("Migration {version} ({description}) failed: {source}")]
    MigrationFailed {
        version: SemVersion,
        description: String,
        applied: Vec<SemVersion>,
        #[source]
        source: Box<MigrationError>,
    },
}

impl MigrationError {
    /// Create a validation error
    pub fn validation(kind: ValidationKind, message: impl Into<String>) -> Self {
        MigrationError::ExpressionValidation {
            kind,
            message: message.into(),
        }
    }

    /// Create an execution error from any driver error
    pub fn execution<E>(statement: impl Into<String>, source: E) -> Self
    where
        E: Into<DriverError>,
    {
        MigrationError::Execution {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// Create an unsupported-feature error
    pub fn unsupported(dialect: impl std::fmt::Display, feature: impl Into<String>) -> Self {
        MigrationError::Unsupported {
            dialect: dialect.to_string(),
            feature: feature.into(),
        }
    }

    /// Whether this error comes from a mistake in a migration's code rather
    /// than from the database
    pub fn is_fatal_authoring_error(&self) -> bool {
        match self {
            MigrationError::IncompleteExpression(_)
            | MigrationError::ExpressionValidation { .. }
            | MigrationError::DuplicateVersion(_) => true,
            MigrationError::MigrationFailed { source, .. } => source.is_fatal_authoring_error(),
            _ => false,
        }
    }

    /// The innermost error, skipping `MigrationFailed` wrappers
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            MigrationError::MigrationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::Connection(err.to_string())
    }
}

impl From<serde_yaml::Error> for MigrationError {
    fn from(err: serde_yaml::Error) -> Self {
        MigrationError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_keeps_driver_source() {
        let driver = std::io::Error::new(std::io::ErrorKind::Other, "unique constraint violated");
        let err = MigrationError::execution("INSERT INTO t VALUES (1)", driver);

        let source = err.source().expect("driver error preserved");
        assert_eq!(source.to_string(), "unique constraint violated");
        assert!(err.to_string().contains("INSERT INTO t VALUES (1)"));
    }

    #[test]
    fn test_migration_failed_reports_version_and_root_cause() {
        let inner = MigrationError::execution("DROP TABLE x", "no such table");
        let err = MigrationError::MigrationFailed {
            version: SemVersion::new(2, 0, 0),
            description: "drop legacy tables".to_string(),
            applied: Vec::new(),
            source: Box::new(inner),
        };

        let message = err.to_string();
        assert!(message.contains("2.0.0"));
        assert!(message.contains("drop legacy tables"));
        assert!(matches!(err.root_cause(), MigrationError::Execution { .. }));
        assert!(!err.is_fatal_authoring_error());
    }

    #[test]
    fn test_authoring_errors() {
        assert!(MigrationError::IncompleteExpression("pending".into()).is_fatal_authoring_error());
        assert!(MigrationError::validation(ValidationKind::NoColumns, "x").is_fatal_authoring_error());
        assert!(!MigrationError::Connection("down".into()).is_fatal_authoring_error());
    }
}
