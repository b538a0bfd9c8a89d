use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit trail for one bulk invocation.
///
/// Created `Pending` before any work happens, finalized exactly once via
/// [`mark_completed`](BulkOperation::mark_completed) or
/// [`mark_failed`](BulkOperation::mark_failed). `Completed` means the run
/// terminated normally, not that every item succeeded; per-item outcomes live
/// in `details`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BulkOperation {
    pub id: Uuid,
    pub actor_id: i64,
    pub operation: OperationKind,
    pub status: OperationStatus,
    pub total_items: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub details: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "operation_kind", rename_all = "lowercase")]
pub enum OperationKind {
    Review,
    Assignment,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "operation_status", rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

impl BulkOperation {
    pub fn new(actor_id: i64, operation: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id,
            operation,
            status: OperationStatus::Pending,
            total_items: 0,
            success_count: 0,
            failure_count: 0,
            details: json!({}),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Terminal transition for a run that finished normally.
    pub fn mark_completed(&mut self, successes: Vec<Value>, failures: Vec<Value>) {
        debug_assert_eq!(self.status, OperationStatus::Pending);
        self.success_count = successes.len() as i32;
        self.failure_count = failures.len() as i32;
        self.total_items = self.success_count + self.failure_count;
        self.details = json!({ "successes": successes, "failures": failures });
        self.status = OperationStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Terminal transition for a strict-mode import that rolled back.
    pub fn mark_failed(&mut self, failures: Vec<Value>) {
        debug_assert_eq!(self.status, OperationStatus::Pending);
        self.success_count = 0;
        self.failure_count = failures.len() as i32;
        self.total_items = self.failure_count;
        self.details = json!({ "successes": [], "failures": failures });
        self.status = OperationStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_completed(&self) -> bool {
        self.status == OperationStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_pending_with_zero_counts() {
        let op = BulkOperation::new(1, OperationKind::Review);
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.total_items, 0);
        assert!(op.completed_at.is_none());
    }

    #[test]
    fn completion_reconciles_counts() {
        let mut op = BulkOperation::new(1, OperationKind::Review);
        op.mark_completed(
            vec![json!({"id": 1}), json!({"id": 2})],
            vec![json!({"id": 3, "error": "not-found"})],
        );
        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.success_count, 2);
        assert_eq!(op.failure_count, 1);
        assert_eq!(op.total_items, op.success_count + op.failure_count);
        assert!(op.completed_at.is_some());
    }

    #[test]
    fn failed_run_keeps_the_full_failure_list() {
        let mut op = BulkOperation::new(1, OperationKind::Import);
        op.mark_failed(vec![json!({"row": {}, "error": "invalid-reference"})]);
        assert_eq!(op.status, OperationStatus::Failed);
        assert_eq!(op.success_count, 0);
        assert_eq!(op.total_items, 1);
        assert_eq!(op.details["failures"].as_array().unwrap().len(), 1);
    }
}
