//! Error types for the SQLite execution layer.
//!
//! Wraps statement-generation and mapping failures from `sqlentity-core`
//! alongside database, configuration and I/O failures.

use sqlentity_core::ModelError;
use thiserror::Error;

/// Errors that can occur while executing entity operations against SQLite.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Metadata, statement generation or row mapping failure.
    #[error(transparent)]
    ModelError(#[from] ModelError),

    /// The row was inserted but its identity could not be read back.
    ///
    /// The database holds the row; the in-memory entity still carries an
    /// unassigned identity.
    #[error("row inserted into '{table}' but its identity was not back-filled: {source}")]
    IdentityNotBackfilled {
        /// Table the row was inserted into.
        table: String,
        /// Failure raised by the identity query or its assignment.
        #[source]
        source: Box<SqliteError>,
    },

    /// Data source configuration is invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A stored value has no [`Value`](sqlentity_core::Value) representation.
    #[error("unsupported value in column '{0}'")]
    UnsupportedValue(String),
}

impl SqliteError {
    /// Whether the failed operation left a row behind in the database.
    pub fn row_persisted(&self) -> bool {
        matches!(self, SqliteError::IdentityNotBackfilled { .. })
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_is_transparent() {
        let err: SqliteError = ModelError::Schema("Foo has no table designation".into()).into();
        assert_eq!(err.to_string(), "schema error: Foo has no table designation");
        assert!(!err.row_persisted());
    }

    #[test]
    fn test_identity_not_backfilled_reports_table() {
        let err = SqliteError::IdentityNotBackfilled {
            table: "authors".into(),
            source: Box::new(SqliteError::UnsupportedValue("id".into())),
        };
        assert!(err.row_persisted());
        let text = err.to_string();
        assert!(text.contains("authors"));
        assert!(text.contains("unsupported value in column 'id'"));
    }
}
