pub mod chunk;
pub mod rows;
pub mod service;

use thiserror::Error;

use crate::store::StoreError;

pub use service::BulkService;

/// Invocation-level errors. Per-item and per-row failures never surface
/// here; they are collected into the operation record's failure list.
#[derive(Debug, Error)]
pub enum BulkError {
    #[error("Bulk operations are restricted to supervisors and admins")]
    PermissionDenied,

    /// Malformed upload: unknown format or missing required headers.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
