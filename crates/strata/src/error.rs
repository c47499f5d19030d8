//! Error types for the migration system.
//!
//! Every fallible operation in this crate returns [`MigrateResult`]. The
//! variants of [`MigrateError`] separate the places an operation can go
//! wrong: loading configuration, reading a source, parsing a migration
//! file, computing a plan, talking to the database, and applying a single
//! planned step.

use thiserror::Error;

use crate::parser::ParseError;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error type for migration operations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Malformed or missing configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// No driver registered under the requested dialect name.
    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// A migration source could not be read.
    #[error("error while reading {name}: {source}")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A migration file violated the migration grammar.
    #[error("error parsing migration ({id}): {source}")]
    Parse {
        id: String,
        #[source]
        source: ParseError,
    },

    /// No plan could be created between the declared and the recorded
    /// migration sets.
    #[error("unable to create migration plan because of {id}: {message}")]
    Plan { id: String, message: String },

    /// A database failure not tied to a specific planned step.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A failure while applying one planned step. `applied` counts the
    /// steps that were fully applied before this one.
    #[error("{source} handling {id}")]
    Tx {
        id: String,
        applied: usize,
        #[source]
        source: Box<MigrateError>,
    },
}

impl MigrateError {
    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new plan error for the named migration.
    pub fn plan(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plan {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Wrap a step failure, recording how many steps completed before it.
    pub fn tx(id: impl Into<String>, applied: usize, source: MigrateError) -> Self {
        Self::Tx {
            id: id.into(),
            applied,
            source: Box::new(source),
        }
    }
}
