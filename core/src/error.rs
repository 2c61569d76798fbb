//! Error types for entity metadata, statement generation and row mapping.
//!
//! Every variant is raised before (or instead of) touching a database; the
//! execution layer wraps this type in its own error.

use thiserror::Error;

/// Errors raised while describing entities, building statements or mapping
/// rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Entity metadata is missing, duplicated or malformed.
    #[error("schema error: {0}")]
    Schema(String),

    /// An INSERT or UPDATE would not carry a single column.
    #[error("no columns qualify for statement on table '{table}'")]
    EmptyColumnSet {
        /// Table the statement targeted.
        table: String,
    },

    /// An UPDATE or DELETE has neither a primary key nor a caller predicate.
    #[error(
        "refusing to build {statement} on table '{table}': no primary key and no where clause"
    )]
    MissingPredicate {
        /// Table the statement targeted.
        table: String,
        /// `UPDATE` or `DELETE`.
        statement: &'static str,
    },

    /// The entity type cannot produce a blank instance to map rows onto.
    #[error("{0} cannot be constructed: no blank instance available")]
    Construction(&'static str),

    /// A row value could not be assigned to its property.
    #[error("cannot map column '{column}': {reason}")]
    Mapping {
        /// Column whose value failed.
        column: String,
        /// Human-readable cause.
        reason: String,
    },

    /// A [`Value`](crate::Value) did not have the shape a conversion expected.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Rust-side type name.
        expected: &'static str,
        /// SQL-side value kind.
        found: &'static str,
    },

    /// A declared relationship has no matching foreign key on the expected type.
    #[error("relationship configuration error: {0}")]
    RelationshipConfiguration(String),
}

impl ModelError {
    /// Re-labels a conversion failure with the column it happened in.
    ///
    /// Errors that already carry more context are returned unchanged.
    pub fn in_column(self, column: &str) -> Self {
        match self {
            ModelError::TypeMismatch { .. } => ModelError::Mapping {
                column: column.to_string(),
                reason: self.to_string(),
            },
            other => other,
        }
    }
}

/// Convenience alias for results with [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;
