//! Store error types for tally-db.

use std::fmt;

use tally_model::TableError;
use thiserror::Error;

/// Errors from grade-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Course id is not in the catalog.
    #[error("unknown course id `{0}`")]
    UnknownCourse(String),

    /// The table model rejected table data.
    #[error(transparent)]
    Table(#[from] TableError),

    /// A stored document failed to decode as JSON.
    #[error("stored table for course `{course_id}` is not valid JSON")]
    Corrupt {
        course_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The write-back upsert returned no row.
    #[error("upsert for course `{0}` returned no row")]
    NoUpdateResult(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Storage settings name neither a local path nor a usable remote.
    #[error("storage is not configured: set a local path, or a remote url with an auth token")]
    NotConfigured,

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a store failure, for callers that branch on
/// the class rather than the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed something the store cannot accept, like an
    /// unknown course id.
    Argument,
    /// The table model rejected the data before anything was persisted.
    Validation,
    /// The storage layer itself failed.
    Storage,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Validation => "validation",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StoreError {
    /// Which class of failure this is.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCourse(_) => ErrorKind::Argument,
            Self::Table(_) => ErrorKind::Validation,
            Self::Corrupt { .. }
            | Self::NoUpdateResult(_)
            | Self::Migration(_)
            | Self::NotConfigured
            | Self::LibSql(_)
            | Self::Other(_) => ErrorKind::Storage,
        }
    }
}
