// Storage seam for the bulk processor.
//
// The processor only needs row-level-locking fetch, field updates, inserts
// and operation-record persistence; everything else about the schema stays
// with the owning modules. Two implementations exist: `PgEntryStore` (sqlx,
// production) and `testing::MemoryStore` (tests).

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::database::models::{BulkOperation, EntryStatus, LogbookEntry, NewLogbookEntry, User};

pub use postgres::PgEntryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write was rejected by a data constraint. Recoverable: the bulk
    /// processor turns this into a failure entry (or a chunk rollback)
    /// instead of aborting the invocation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Infrastructure failure; always propagated to the caller.
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// One transactional scope: writes are pending until `commit`, discarded on
/// `rollback` (or on drop).
#[async_trait]
pub trait EntryTxn: Send {
    /// Fetch-and-lock every entry whose id is in `ids`, in `ids` order.
    /// Ids with no matching row are simply absent from the result.
    async fn lock_entries(&mut self, ids: &[i64]) -> Result<Vec<LogbookEntry>, StoreError>;

    async fn update_status(
        &mut self,
        id: i64,
        status: EntryStatus,
        action_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn update_supervisor(&mut self, id: i64, supervisor_id: i64) -> Result<(), StoreError>;

    async fn insert_entry(&mut self, entry: &NewLogbookEntry) -> Result<i64, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait EntryStore: Clone + Send + Sync + 'static {
    type Txn: EntryTxn;

    async fn begin(&self) -> Result<Self::Txn, StoreError>;

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Resolve a postgraduate trainee by username (import natural key).
    async fn find_trainee(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Resolve a supervisor by id; `None` when absent or not a supervisor.
    async fn find_supervisor(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Auto-committed insert, used by the partial-allowed import path where
    /// rows persist independently of each other.
    async fn insert_entry(&self, entry: &NewLogbookEntry) -> Result<i64, StoreError>;

    async fn insert_operation(&self, operation: &BulkOperation) -> Result<(), StoreError>;

    async fn finalize_operation(&self, operation: &BulkOperation) -> Result<(), StoreError>;
}
