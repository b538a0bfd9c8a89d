use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Closed set of platform roles. Bulk operations are gated on this,
/// so membership is checked by explicit match rather than string probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    /// Postgraduate trainee - the owner of logbook entries.
    Pg,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
    pub specialty: Option<String>,
}

impl User {
    /// Whether this user may run bulk operations against other users' records.
    pub fn can_bulk_operate(&self) -> bool {
        self.is_superuser || matches!(self.role, Role::Admin | Role::Supervisor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, is_superuser: bool) -> User {
        User {
            id: 1,
            username: "someone".to_string(),
            role,
            is_superuser,
            specialty: None,
        }
    }

    #[test]
    fn bulk_access_by_role() {
        assert!(user(Role::Admin, false).can_bulk_operate());
        assert!(user(Role::Supervisor, false).can_bulk_operate());
        assert!(!user(Role::Pg, false).can_bulk_operate());
    }

    #[test]
    fn superuser_flag_overrides_role() {
        assert!(user(Role::Pg, true).can_bulk_operate());
    }
}
