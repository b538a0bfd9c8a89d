//! Test support: an in-memory [`EntryStore`] with transaction buffering.
//!
//! Writes inside a transaction are pending until `commit` and discarded on
//! `rollback` (or drop), which is what the bulk executors rely on. Row
//! locking is not emulated; tests are single-invocation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::database::models::{
    BulkOperation, EntryStatus, LogbookEntry, NewLogbookEntry, Role, User,
};
use crate::store::{EntryStore, EntryTxn, StoreError};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<i64, User>,
    entries: BTreeMap<i64, LogbookEntry>,
    operations: HashMap<Uuid, BulkOperation>,
    next_entry_id: i64,
    // Entry ids whose writes fail as if a data constraint rejected them.
    rejected_writes: HashSet<i64>,
    // Case titles whose inserts fail the same way.
    rejected_titles: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user(&self, id: i64, username: &str, role: Role) -> User {
        let user = User {
            id,
            username: username.to_string(),
            role,
            is_superuser: false,
            specialty: None,
        };
        self.inner.lock().unwrap().users.insert(id, user.clone());
        user
    }

    pub fn seed_entry(&self, pg_id: i64, case_title: &str) -> i64 {
        let mut state = self.inner.lock().unwrap();
        state.next_entry_id += 1;
        let id = state.next_entry_id;
        state.entries.insert(
            id,
            LogbookEntry {
                id,
                pg_id,
                supervisor_id: None,
                case_title: case_title.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                status: EntryStatus::Draft,
                location: "Ward".to_string(),
                patient_history: "History".to_string(),
                management_action: "Action".to_string(),
                topic_subtopic: "Topic".to_string(),
                supervisor_action_at: None,
                created_by: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Make every write against `id` fail with a validation error.
    pub fn reject_writes_to(&self, id: i64) {
        self.inner.lock().unwrap().rejected_writes.insert(id);
    }

    /// Make every insert carrying `case_title` fail with a validation error.
    pub fn reject_inserts_titled(&self, case_title: &str) {
        self.inner
            .lock()
            .unwrap()
            .rejected_titles
            .insert(case_title.to_string());
    }

    pub fn entry(&self, id: i64) -> Option<LogbookEntry> {
        self.inner.lock().unwrap().entries.get(&id).cloned()
    }

    pub fn entries(&self) -> Vec<LogbookEntry> {
        self.inner.lock().unwrap().entries.values().cloned().collect()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn count_with_status(&self, status: EntryStatus) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.status == status)
            .count()
    }

    pub fn count_with_title(&self, case_title: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|e| e.case_title == case_title)
            .count()
    }

    pub fn operations(&self) -> Vec<BulkOperation> {
        self.inner
            .lock()
            .unwrap()
            .operations
            .values()
            .cloned()
            .collect()
    }
}

enum Write {
    Status {
        id: i64,
        status: EntryStatus,
        action_at: DateTime<Utc>,
    },
    Supervisor {
        id: i64,
        supervisor_id: i64,
    },
    Insert {
        id: i64,
        entry: LogbookEntry,
    },
}

pub struct MemoryTxn {
    inner: Arc<Mutex<MemoryState>>,
    pending: Vec<Write>,
}

impl MemoryTxn {
    fn check_write(&self, id: i64) -> Result<(), StoreError> {
        if self.inner.lock().unwrap().rejected_writes.contains(&id) {
            return Err(StoreError::Validation(format!(
                "entry {id} failed validation"
            )));
        }
        Ok(())
    }
}

fn rejected_title(case_title: &str) -> StoreError {
    StoreError::Validation(format!("entry '{case_title}' failed validation"))
}

fn build_entry(id: i64, entry: &NewLogbookEntry) -> LogbookEntry {
    LogbookEntry {
        id,
        pg_id: entry.pg_id,
        supervisor_id: None,
        case_title: entry.case_title.clone(),
        date: entry.date,
        status: entry.status,
        location: entry.location.clone(),
        patient_history: entry.patient_history.clone(),
        management_action: entry.management_action.clone(),
        topic_subtopic: entry.topic_subtopic.clone(),
        supervisor_action_at: None,
        created_by: Some(entry.created_by),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl EntryTxn for MemoryTxn {
    async fn lock_entries(&mut self, ids: &[i64]) -> Result<Vec<LogbookEntry>, StoreError> {
        let state = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect())
    }

    async fn update_status(
        &mut self,
        id: i64,
        status: EntryStatus,
        action_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_write(id)?;
        self.pending.push(Write::Status {
            id,
            status,
            action_at,
        });
        Ok(())
    }

    async fn update_supervisor(&mut self, id: i64, supervisor_id: i64) -> Result<(), StoreError> {
        self.check_write(id)?;
        self.pending.push(Write::Supervisor { id, supervisor_id });
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &NewLogbookEntry) -> Result<i64, StoreError> {
        // Reserve the id eagerly, like a database sequence: rollback leaves a gap.
        let id = {
            let mut state = self.inner.lock().unwrap();
            if state.rejected_titles.contains(&entry.case_title) {
                return Err(rejected_title(&entry.case_title));
            }
            state.next_entry_id += 1;
            state.next_entry_id
        };
        self.pending.push(Write::Insert {
            id,
            entry: build_entry(id, entry),
        });
        Ok(id)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        for write in self.pending {
            match write {
                Write::Status {
                    id,
                    status,
                    action_at,
                } => {
                    if let Some(entry) = state.entries.get_mut(&id) {
                        entry.status = status;
                        entry.supervisor_action_at = Some(action_at);
                    }
                }
                Write::Supervisor { id, supervisor_id } => {
                    if let Some(entry) = state.entries.get_mut(&id) {
                        entry.supervisor_id = Some(supervisor_id);
                    }
                }
                Write::Insert { id, entry } => {
                    state.entries.insert(id, entry);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        // Pending writes are simply dropped.
        Ok(())
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    type Txn = MemoryTxn;

    async fn begin(&self) -> Result<MemoryTxn, StoreError> {
        Ok(MemoryTxn {
            inner: Arc::clone(&self.inner),
            pending: Vec::new(),
        })
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_trainee(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username && u.role == Role::Pg)
            .cloned())
    }

    async fn find_supervisor(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .get(&id)
            .filter(|u| u.role == Role::Supervisor)
            .cloned())
    }

    async fn insert_entry(&self, entry: &NewLogbookEntry) -> Result<i64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.rejected_titles.contains(&entry.case_title) {
            return Err(rejected_title(&entry.case_title));
        }
        state.next_entry_id += 1;
        let id = state.next_entry_id;
        state.entries.insert(id, build_entry(id, entry));
        Ok(id)
    }

    async fn insert_operation(&self, operation: &BulkOperation) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .operations
            .insert(operation.id, operation.clone());
        Ok(())
    }

    async fn finalize_operation(&self, operation: &BulkOperation) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .operations
            .insert(operation.id, operation.clone());
        Ok(())
    }
}
