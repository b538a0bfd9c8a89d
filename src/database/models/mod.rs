pub mod entry;
pub mod operation;
pub mod user;

pub use entry::{EntryStatus, LogbookEntry, NewLogbookEntry};
pub use operation::{BulkOperation, OperationKind, OperationStatus};
pub use user::{Role, User};
