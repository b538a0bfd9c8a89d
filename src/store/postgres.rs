use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::database::models::{
    BulkOperation, EntryStatus, LogbookEntry, NewLogbookEntry, Role, User,
};
use crate::store::{EntryStore, EntryTxn, StoreError};

const ENTRY_COLUMNS: &str = "id, pg_id, supervisor_id, case_title, date, status, location, \
     patient_history, management_action, topic_subtopic, supervisor_action_at, \
     created_by, created_at";

/// sqlx-backed store over the SIMS Postgres database.
#[derive(Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgEntryTxn {
    tx: Transaction<'static, Postgres>,
}

/// Constraint violations come back as recoverable validation failures; the
/// bulk processor records them per item instead of aborting the invocation.
fn map_write_err(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // check_violation, foreign_key_violation, not_null_violation,
            // string_data_right_truncation
            Some("23514") | Some("23503") | Some("23502") | Some("22001") => {
                return StoreError::Validation(db_err.message().to_string());
            }
            _ => {}
        }
    }
    StoreError::from(err)
}

fn insert_entry_sql() -> &'static str {
    "INSERT INTO logbook_entries \
         (pg_id, case_title, date, status, location, patient_history, \
          management_action, topic_subtopic, created_by) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
     RETURNING id"
}

#[async_trait]
impl EntryTxn for PgEntryTxn {
    async fn lock_entries(&mut self, ids: &[i64]) -> Result<Vec<LogbookEntry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries \
             WHERE id = ANY($1) \
             ORDER BY array_position($1, id) \
             FOR UPDATE"
        );
        let entries = sqlx::query_as::<_, LogbookEntry>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(entries)
    }

    async fn update_status(
        &mut self,
        id: i64,
        status: EntryStatus,
        action_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE logbook_entries SET status = $2, supervisor_action_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(action_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_err)?;
        Ok(())
    }

    async fn update_supervisor(&mut self, id: i64, supervisor_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE logbook_entries SET supervisor_id = $2 WHERE id = $1")
            .bind(id)
            .bind(supervisor_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_err)?;
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &NewLogbookEntry) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(insert_entry_sql())
            .bind(entry.pg_id)
            .bind(&entry.case_title)
            .bind(entry.date)
            .bind(entry.status)
            .bind(&entry.location)
            .bind(&entry.patient_history)
            .bind(&entry.management_action)
            .bind(&entry.topic_subtopic)
            .bind(entry.created_by)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_write_err)?;
        Ok(id)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    type Txn = PgEntryTxn;

    async fn begin(&self) -> Result<PgEntryTxn, StoreError> {
        Ok(PgEntryTxn {
            tx: self.pool.begin().await?,
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, role, is_superuser, specialty FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_trainee(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, role, is_superuser, specialty FROM users \
             WHERE username = $1 AND role = $2",
        )
        .bind(username)
        .bind(Role::Pg)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_supervisor(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, role, is_superuser, specialty FROM users \
             WHERE id = $1 AND role = $2",
        )
        .bind(id)
        .bind(Role::Supervisor)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_entry(&self, entry: &NewLogbookEntry) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(insert_entry_sql())
            .bind(entry.pg_id)
            .bind(&entry.case_title)
            .bind(entry.date)
            .bind(entry.status)
            .bind(&entry.location)
            .bind(&entry.patient_history)
            .bind(&entry.management_action)
            .bind(&entry.topic_subtopic)
            .bind(entry.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_err)?;
        Ok(id)
    }

    async fn insert_operation(&self, operation: &BulkOperation) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bulk_operations \
                 (id, actor_id, operation, status, total_items, success_count, \
                  failure_count, details, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(operation.id)
        .bind(operation.actor_id)
        .bind(operation.operation)
        .bind(operation.status)
        .bind(operation.total_items)
        .bind(operation.success_count)
        .bind(operation.failure_count)
        .bind(&operation.details)
        .bind(operation.created_at)
        .bind(operation.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalize_operation(&self, operation: &BulkOperation) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE bulk_operations \
             SET status = $2, total_items = $3, success_count = $4, \
                 failure_count = $5, details = $6, completed_at = $7 \
             WHERE id = $1",
        )
        .bind(operation.id)
        .bind(operation.status)
        .bind(operation.total_items)
        .bind(operation.success_count)
        .bind(operation.failure_count)
        .bind(&operation.details)
        .bind(operation.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
