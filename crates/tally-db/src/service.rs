//! The grades store: catalog lookup plus the read-mutate-write protocol
//! around a table model.

use tally_config::StorageConfig;
use tally_core::catalog::CourseCatalog;
use tally_model::{CourseTableModel, TableModel};

use crate::TallyDb;
use crate::error::StoreError;

/// Persistent store of one grade table per known course.
///
/// Every mutation method follows this protocol:
/// 1. Resolve the course id against the catalog
/// 2. Read and materialize the currently stored table
/// 3. Delegate the mutation to the table model
/// 4. Persist the model's raw output wholesale
/// 5. Materialize and return the freshly stored table
///
/// The store never interprets table contents itself; all table semantics
/// live behind `M`. Concurrent writers race read-modify-write: the last
/// write wins and the loser's changes are silently lost, but the stored
/// document is always one writer's complete, validated output.
#[derive(Debug)]
pub struct GradesStore<M: TableModel = CourseTableModel> {
    db: TallyDb,
    model: M,
    catalog: CourseCatalog,
}

impl GradesStore {
    /// Open a store over a local database file (`:memory:` for tests).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let db = TallyDb::open_local(path).await?;
        Ok(Self::with_model(db, CourseTableModel))
    }

    /// Open a store over a remote libSQL endpoint.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the endpoint cannot be reached or
    /// migrations fail.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self, StoreError> {
        let db = TallyDb::open_remote(url, auth_token).await?;
        Ok(Self::with_model(db, CourseTableModel))
    }

    /// Open a store from storage configuration: the remote endpoint when
    /// one is set, the local file otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotConfigured`] when the config names
    /// neither backend, plus the open failure modes above.
    pub async fn open_from_config(storage: &StorageConfig) -> Result<Self, StoreError> {
        if !storage.is_configured() {
            return Err(StoreError::NotConfigured);
        }
        if storage.is_remote() {
            Self::open_remote(&storage.url, &storage.auth_token).await
        } else {
            Self::open(&storage.path).await
        }
    }
}

impl<M: TableModel> GradesStore<M> {
    /// Build a store from an existing database handle and a custom table
    /// model (for testing).
    #[must_use]
    pub fn with_model(db: TallyDb, model: M) -> Self {
        Self {
            db,
            model,
            catalog: CourseCatalog::builtin(),
        }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &TallyDb {
        &self.db
    }

    /// Access the table model.
    #[must_use]
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// Access the course registry this store serves.
    #[must_use]
    pub const fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    /// Release the store and its database connection.
    pub fn close(self) {
        drop(self);
    }
}
