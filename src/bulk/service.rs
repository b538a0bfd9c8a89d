use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::bulk::chunk::chunked;
use crate::bulk::rows::{self, ImportRow};
use crate::bulk::BulkError;
use crate::config;
use crate::database::models::{
    BulkOperation, EntryStatus, NewLogbookEntry, OperationKind, User,
};
use crate::store::{EntryStore, EntryTxn, StoreError};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Synchronous bulk processor: the caller blocks until every chunk (or the
/// whole import) has run and the operation record is finalized.
///
/// Construction is the permission gate: it fails before any data access when
/// the actor lacks the supervisor/admin role.
#[derive(Debug)]
pub struct BulkService<S: EntryStore> {
    store: S,
    actor: User,
    chunk_size: usize,
}

enum RowOutcome {
    Candidate(NewLogbookEntry),
    Failure(Value),
}

impl<S: EntryStore> BulkService<S> {
    pub fn new(store: S, actor: User) -> Result<Self, BulkError> {
        Self::with_chunk_size(store, actor, config::config().bulk.chunk_size)
    }

    pub fn with_chunk_size(store: S, actor: User, chunk_size: usize) -> Result<Self, BulkError> {
        if !actor.can_bulk_operate() {
            return Err(BulkError::PermissionDenied);
        }
        Ok(Self {
            store,
            actor,
            chunk_size,
        })
    }

    // ------------------------------------------------------------------
    // Review and assignment

    /// Apply `status` to every resolvable entry, one locked transaction per
    /// chunk. Failed chunks roll back alone; earlier chunks stay committed.
    pub async fn review_entries(
        &self,
        entry_ids: &[i64],
        status: EntryStatus,
    ) -> Result<BulkOperation, BulkError> {
        let mut operation = BulkOperation::new(self.actor.id, OperationKind::Review);
        self.store.insert_operation(&operation).await?;

        let mut successes: Vec<Value> = Vec::new();
        let mut failures: Vec<Value> = Vec::new();
        for chunk in chunked(entry_ids, self.chunk_size) {
            let mut txn = self.store.begin().await?;
            let entries = txn.lock_entries(chunk).await?;
            record_missing(chunk, &entries.iter().map(|e| e.id).collect(), &mut failures);

            let mut chunk_successes: Vec<Value> = Vec::with_capacity(entries.len());
            let mut validation_error = None;
            for entry in &entries {
                match txn.update_status(entry.id, status, Utc::now()).await {
                    Ok(()) => {
                        chunk_successes.push(json!({ "id": entry.id, "status": status }));
                    }
                    Err(StoreError::Validation(msg)) => {
                        validation_error = Some(msg);
                        break;
                    }
                    Err(err) => {
                        let _ = txn.rollback().await;
                        return Err(err.into());
                    }
                }
            }

            match validation_error {
                Some(msg) => {
                    txn.rollback().await?;
                    warn!(operation = %operation.id, error = %msg, "review chunk rolled back");
                    failures.push(json!({ "ids": chunk, "error": msg }));
                }
                None => {
                    txn.commit().await?;
                    successes.append(&mut chunk_successes);
                }
            }
        }

        operation.mark_completed(successes, failures);
        self.store.finalize_operation(&operation).await?;
        info!(
            operation = %operation.id,
            succeeded = operation.success_count,
            failed = operation.failure_count,
            "bulk review finished"
        );
        Ok(operation)
    }

    /// Reassign every resolvable entry to `supervisor`, with the same
    /// per-chunk transactional semantics as review.
    pub async fn assign_supervisor(
        &self,
        entry_ids: &[i64],
        supervisor: &User,
    ) -> Result<BulkOperation, BulkError> {
        let mut operation = BulkOperation::new(self.actor.id, OperationKind::Assignment);
        self.store.insert_operation(&operation).await?;

        let mut successes: Vec<Value> = Vec::new();
        let mut failures: Vec<Value> = Vec::new();
        for chunk in chunked(entry_ids, self.chunk_size) {
            let mut txn = self.store.begin().await?;
            let entries = txn.lock_entries(chunk).await?;
            record_missing(chunk, &entries.iter().map(|e| e.id).collect(), &mut failures);

            let mut chunk_successes: Vec<Value> = Vec::with_capacity(entries.len());
            let mut validation_error = None;
            for entry in &entries {
                match txn.update_supervisor(entry.id, supervisor.id).await {
                    Ok(()) => {
                        chunk_successes.push(json!({ "id": entry.id, "supervisor": supervisor.id }));
                    }
                    Err(StoreError::Validation(msg)) => {
                        validation_error = Some(msg);
                        break;
                    }
                    Err(err) => {
                        let _ = txn.rollback().await;
                        return Err(err.into());
                    }
                }
            }

            match validation_error {
                Some(msg) => {
                    txn.rollback().await?;
                    warn!(operation = %operation.id, error = %msg, "assignment chunk rolled back");
                    failures.push(json!({ "ids": chunk, "error": msg }));
                }
                None => {
                    txn.commit().await?;
                    successes.append(&mut chunk_successes);
                }
            }
        }

        operation.mark_completed(successes, failures);
        self.store.finalize_operation(&operation).await?;
        info!(
            operation = %operation.id,
            supervisor = supervisor.id,
            succeeded = operation.success_count,
            failed = operation.failure_count,
            "bulk assignment finished"
        );
        Ok(operation)
    }

    // ------------------------------------------------------------------
    // Import

    /// Import logbook entries from an uploaded CSV/XLSX file.
    ///
    /// `dry_run` validates rows without persisting anything. With
    /// `allow_partial` rows persist independently; without it the whole
    /// batch commits or rolls back as one.
    pub async fn import_entries(
        &self,
        filename: &str,
        bytes: &[u8],
        dry_run: bool,
        allow_partial: bool,
    ) -> Result<BulkOperation, BulkError> {
        // Header/format problems abort before any per-row result exists.
        let parsed_rows = rows::parse_rows(filename, bytes)?;

        let mut operation = BulkOperation::new(self.actor.id, OperationKind::Import);
        self.store.insert_operation(&operation).await?;

        let mut successes: Vec<Value> = Vec::new();
        let mut failures: Vec<Value> = Vec::new();

        if dry_run || allow_partial {
            for row in &parsed_rows {
                match self.prepare_row(row).await? {
                    RowOutcome::Failure(entry) => failures.push(entry),
                    RowOutcome::Candidate(candidate) => {
                        if dry_run {
                            successes.push(import_success(&candidate));
                        } else {
                            match self.store.insert_entry(&candidate).await {
                                Ok(_) => successes.push(import_success(&candidate)),
                                Err(StoreError::Validation(msg)) => {
                                    failures.push(json!({ "row": row, "error": msg }));
                                }
                                Err(err) => return Err(err.into()),
                            }
                        }
                    }
                }
            }
        } else {
            // Strict mode: one transaction around the whole batch; any row
            // failure discards every insert.
            let mut txn = self.store.begin().await?;
            for row in &parsed_rows {
                match self.prepare_row(row).await? {
                    RowOutcome::Failure(entry) => failures.push(entry),
                    RowOutcome::Candidate(candidate) => match txn.insert_entry(&candidate).await {
                        Ok(_) => successes.push(import_success(&candidate)),
                        Err(StoreError::Validation(msg)) => {
                            failures.push(json!({ "row": row, "error": msg }));
                        }
                        Err(err) => {
                            let _ = txn.rollback().await;
                            return Err(err.into());
                        }
                    },
                }
            }

            if failures.is_empty() {
                txn.commit().await?;
            } else {
                txn.rollback().await?;
                warn!(
                    operation = %operation.id,
                    failed = failures.len(),
                    "strict import rolled back"
                );
                operation.mark_failed(failures);
                self.store.finalize_operation(&operation).await?;
                return Ok(operation);
            }
        }

        operation.mark_completed(successes, failures);
        self.store.finalize_operation(&operation).await?;
        info!(
            operation = %operation.id,
            dry_run,
            allow_partial,
            succeeded = operation.success_count,
            failed = operation.failure_count,
            "bulk import finished"
        );
        Ok(operation)
    }

    /// Resolve, type-check and validate one row. Row-level problems become
    /// failure entries; only infrastructure errors propagate.
    async fn prepare_row(&self, row: &ImportRow) -> Result<RowOutcome, BulkError> {
        let username = row.get("pg_username").map(String::as_str).unwrap_or("");
        let trainee = match self.store.find_trainee(username).await? {
            Some(user) => user,
            None => {
                return Ok(RowOutcome::Failure(
                    json!({ "row": row, "error": "invalid-reference" }),
                ))
            }
        };

        let raw_date = row.get("date").map(String::as_str).unwrap_or("");
        let date = match NaiveDate::parse_from_str(raw_date, DATE_FORMAT) {
            Ok(date) => date,
            Err(_) => {
                return Ok(RowOutcome::Failure(
                    json!({ "row": row, "error": "invalid-date" }),
                ))
            }
        };

        let raw_status = row.get("status").map(String::as_str).unwrap_or("");
        let status = if raw_status.is_empty() {
            EntryStatus::Draft
        } else {
            match EntryStatus::parse(raw_status) {
                Some(status) => status,
                None => {
                    return Ok(RowOutcome::Failure(
                        json!({ "row": row, "error": "invalid-status" }),
                    ))
                }
            }
        };

        let candidate = NewLogbookEntry::from_row(row, &trainee, date, status, self.actor.id);
        if let Err(msg) = candidate.validate() {
            return Ok(RowOutcome::Failure(json!({ "row": row, "error": msg })));
        }
        Ok(RowOutcome::Candidate(candidate))
    }
}

fn record_missing(chunk: &[i64], found: &HashSet<i64>, failures: &mut Vec<Value>) {
    for id in chunk {
        if !found.contains(id) {
            failures.push(json!({ "id": id, "error": "not-found" }));
        }
    }
}

fn import_success(candidate: &NewLogbookEntry) -> Value {
    json!({
        "pg": candidate.pg_username,
        "case_title": candidate.case_title,
        "status": candidate.status,
    })
}
