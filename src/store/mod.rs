//! Record store: the canonical state of every uploaded image.
//!
//! One trait, two interchangeable backends. `MemoryStore` keeps records in a
//! process-local map; `DatabaseStore` persists them in SQLite via SeaORM.
//! Backend selection happens once at startup from configuration; nothing
//! downstream of the trait ever branches on which backend is in use.

pub mod database;
pub mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::error::{AppError, AppResult};
use crate::migration::{Migrator, MigratorTrait};
use crate::models::{AnalysisOutcome, ImageRecord, NewImage, StatsSnapshot};

pub use database::DatabaseStore;
pub use memory::MemoryStore;

/// Shared handle to the configured record store.
pub type SharedStore = Arc<dyn RecordStore>;

/// Canonical store of image records and the lifecycle contract over them.
///
/// Lifecycle: records are created `pending`, mutated exactly once by
/// [`RecordStore::transition`] to a terminal state, and leave the store only
/// through [`RecordStore::delete`].
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record in state `pending`.
    ///
    /// Rejects empty filenames with a validation error before any mutation.
    async fn create(&self, image: NewImage) -> AppResult<ImageRecord>;

    /// Fetch a record scoped to its owner.
    ///
    /// A record belonging to another owner is indistinguishable from an
    /// absent one: both are `NotFound`.
    async fn get(&self, id: Uuid, owner_id: Uuid) -> AppResult<ImageRecord>;

    /// Page through completed records, newest upload first.
    ///
    /// `owner` of `None` is the global completed-analyses feed. Pages are
    /// 1-indexed. Returns the page plus the total completed count for the
    /// same scope.
    async fn list_completed(
        &self,
        owner: Option<Uuid>,
        page: u32,
        limit: u32,
    ) -> AppResult<(Vec<ImageRecord>, u64)>;

    /// Pending records uploaded before `older_than`, oldest first.
    ///
    /// Sweep support for the analysis worker; the age cutoff keeps the sweep
    /// from re-reading records whose triggered analysis is still in flight.
    async fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: u32,
    ) -> AppResult<Vec<ImageRecord>>;

    /// Atomically move a pending record to a terminal state.
    ///
    /// This is the only mutation path after creation and the system's single
    /// compare-and-set point: the write is guarded by `status = pending`, so
    /// of any number of racing callers exactly one wins and the rest get
    /// `InvalidTransition`. Terminal records are never overwritten.
    async fn transition(&self, id: Uuid, outcome: AnalysisOutcome) -> AppResult<ImageRecord>;

    /// Remove a record entirely, scoped to its owner.
    ///
    /// Deletion is the only exit from a terminal state. Returns the removed
    /// record so the caller can release the stored file bytes.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> AppResult<ImageRecord>;

    /// Recompute the status and risk distributions from current state.
    async fn stats(&self) -> AppResult<StatsSnapshot>;
}

/// Validate input for record creation. Shared by both backends so the
/// contract cannot drift between them.
pub(crate) fn validate_new_image(image: &NewImage) -> AppResult<()> {
    if image.filename.trim().is_empty() {
        return Err(AppError::Validation("filename must not be empty".into()));
    }
    if image.original_filename.trim().is_empty() {
        return Err(AppError::Validation(
            "original filename must not be empty".into(),
        ));
    }
    Ok(())
}

/// Open the record store named by the configuration.
///
/// The database backend connects and runs pending migrations; the memory
/// backend starts empty.
pub async fn open(config: &Config) -> AppResult<SharedStore> {
    match config.store_backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Database => {
            let conn = sea_orm::Database::connect(&config.database_url)
                .await
                .map_err(|e| AppError::Database(format!("Failed to connect: {}", e)))?;
            Migrator::up(&conn, None)
                .await
                .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
            Ok(Arc::new(DatabaseStore::new(conn)))
        }
    }
}
