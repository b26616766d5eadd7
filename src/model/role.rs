use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Staff,
    Student,
}

impl Role {
    /// Roles that check in for themselves and are bound by the school geofence.
    pub fn self_checks_in(&self) -> bool {
        matches!(self, Role::Teacher | Role::Staff)
    }

    pub fn is_staff_member(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher | Role::Staff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lowercase_names() {
        assert_eq!("teacher".parse::<Role>(), Ok(Role::Teacher));
        assert!("principal".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn only_teachers_and_staff_self_check_in() {
        assert!(Role::Teacher.self_checks_in());
        assert!(Role::Staff.self_checks_in());
        assert!(!Role::Student.self_checks_in());
        assert!(!Role::Admin.self_checks_in());
    }
}
