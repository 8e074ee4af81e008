//! # tally-db
//!
//! libSQL persistence for Tally course grade tables.
//!
//! A single `grades` table holds one document per course: the course id
//! and the course's raw grade table as JSON. [`GradesStore`] layers the
//! store protocol on top of it: validate the course id against the
//! catalog, read and materialize the stored table, delegate mutations to
//! the table model, then persist the model's output wholesale with an
//! atomic insert-or-update.
//!
//! Uses the `libsql` crate (v0.9.29): local files and `:memory:`
//! databases for tests, remote endpoints for hosted deployments.

pub mod error;
mod grades;
mod migrations;
pub mod service;

#[cfg(test)]
mod test_support;

pub use error::{ErrorKind, StoreError};
pub use service::GradesStore;

use libsql::Builder;

/// Database handle for the grades store.
///
/// Wraps a libSQL database and its connection. A [`GradesStore`] owns
/// one and issues every query through it.
#[derive(Debug)]
pub struct TallyDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl TallyDb {
    /// Open a local-only database at the given path (`:memory:` works).
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let tally_db = Self { db, conn };
        tally_db.run_migrations().await?;
        tracing::debug!(path, "opened local grades database");
        Ok(tally_db)
    }

    /// Open a remote libSQL database.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the endpoint cannot be reached or
    /// migrations fail.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self, StoreError> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await?;
        let conn = db.connect()?;

        let tally_db = Self { db, conn };
        tally_db.run_migrations().await?;
        tracing::debug!(url, "opened remote grades database");
        Ok(tally_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}
