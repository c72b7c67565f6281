//! Error taxonomy for fixture preparation and cleanup.

use thiserror::Error;

/// Failures surfaced while compiling or applying fixture data.
///
/// The variants separate "your declaration is wrong" and "your test data is
/// malformed" from "the database rejected the statement", so callers can fail
/// a test with a diagnosis instead of a bare driver error.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The fixture declaration itself is invalid (missing id column, unknown
    /// id column name, null id value, duplicate CSV header). Raised during
    /// compilation, before any statement executes.
    #[error("invalid fixture declaration: {0}")]
    Declaration(String),

    /// A referenced table could not be introspected, or no column types were
    /// resolved for it.
    #[error("could not resolve column types for table '{table}'")]
    SchemaResolution {
        table: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A textual value could not be converted to its resolved column type
    /// while binding statement parameters.
    #[error("could not convert {detail}")]
    Value {
        detail: String,
        #[source]
        source: anyhow::Error,
    },

    /// The database rejected a statement or the connection failed. The
    /// enclosing transaction has been rolled back when this is returned.
    #[error("statement execution failed: {detail}")]
    Execution {
        detail: String,
        #[source]
        source: anyhow::Error,
    },
}

impl FixtureError {
    pub(crate) fn execution(detail: impl Into<String>, source: anyhow::Error) -> Self {
        FixtureError::Execution {
            detail: detail.into(),
            source,
        }
    }

    pub(crate) fn unresolved_table(table: impl Into<String>) -> Self {
        FixtureError::SchemaResolution {
            table: table.into(),
            source: None,
        }
    }
}
