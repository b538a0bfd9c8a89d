use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::bulk::rows::ImportRow;
use crate::database::models::user::User;

/// Review lifecycle of a logbook entry. The bulk processor only ever writes
/// this field and the supervisor reference; everything else belongs to the
/// logbook module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "entry_status", rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Returned,
    Archived,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Pending => "pending",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
            EntryStatus::Returned => "returned",
            EntryStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(EntryStatus::Draft),
            "pending" => Some(EntryStatus::Pending),
            "approved" => Some(EntryStatus::Approved),
            "rejected" => Some(EntryStatus::Rejected),
            "returned" => Some(EntryStatus::Returned),
            "archived" => Some(EntryStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogbookEntry {
    pub id: i64,
    pub pg_id: i64,
    pub supervisor_id: Option<i64>,
    pub case_title: String,
    pub date: NaiveDate,
    pub status: EntryStatus,
    pub location: String,
    pub patient_history: String,
    pub management_action: String,
    pub topic_subtopic: String,
    pub supervisor_action_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Candidate entry built from one import row. Transient: validated (and, when
/// the commit policy allows, inserted) then discarded.
#[derive(Debug, Clone)]
pub struct NewLogbookEntry {
    pub pg_id: i64,
    pub pg_username: String,
    pub case_title: String,
    pub date: NaiveDate,
    pub status: EntryStatus,
    pub location: String,
    pub patient_history: String,
    pub management_action: String,
    pub topic_subtopic: String,
    pub created_by: i64,
}

const MAX_TITLE_LEN: usize = 200;

impl NewLogbookEntry {
    /// Build a candidate from a parsed row, defaulting the optional columns.
    pub fn from_row(
        row: &ImportRow,
        trainee: &User,
        date: NaiveDate,
        status: EntryStatus,
        actor_id: i64,
    ) -> Self {
        Self {
            pg_id: trainee.id,
            pg_username: trainee.username.clone(),
            case_title: cell_or(row, "case_title", "Untitled"),
            date,
            status,
            location: cell_or(row, "location", "Not specified"),
            patient_history: cell_or(row, "patient_history", "Pending summary"),
            management_action: cell_or(row, "management_action", "Pending action"),
            topic_subtopic: cell_or(row, "topic_subtopic", "General"),
            created_by: actor_id,
        }
    }

    /// Field-level validation, run before any persistence attempt and as the
    /// whole of a dry-run pass.
    pub fn validate(&self) -> Result<(), String> {
        if self.case_title.trim().is_empty() {
            return Err("case_title must not be blank".to_string());
        }
        if self.case_title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("case_title exceeds {} characters", MAX_TITLE_LEN));
        }
        Ok(())
    }
}

fn cell_or(row: &ImportRow, column: &str, default: &str) -> String {
    match row.get(column) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::user::Role;

    fn trainee() -> User {
        User {
            id: 7,
            username: "pg1".to_string(),
            role: Role::Pg,
            is_superuser: false,
            specialty: Some("surgery".to_string()),
        }
    }

    #[test]
    fn candidate_defaults_optional_columns() {
        let mut row = ImportRow::new();
        row.insert("pg_username".to_string(), "pg1".to_string());
        row.insert("case_title".to_string(), String::new());
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let entry = NewLogbookEntry::from_row(&row, &trainee(), date, EntryStatus::Draft, 1);
        assert_eq!(entry.case_title, "Untitled");
        assert_eq!(entry.location, "Not specified");
        assert_eq!(entry.topic_subtopic, "General");
        assert_eq!(entry.created_by, 1);
    }

    #[test]
    fn overlong_title_fails_validation() {
        let mut row = ImportRow::new();
        row.insert("case_title".to_string(), "x".repeat(201));
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let entry = NewLogbookEntry::from_row(&row, &trainee(), date, EntryStatus::Draft, 1);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            EntryStatus::Draft,
            EntryStatus::Pending,
            EntryStatus::Approved,
            EntryStatus::Rejected,
            EntryStatus::Returned,
            EntryStatus::Archived,
        ] {
            assert_eq!(EntryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::parse("bogus"), None);
    }
}
