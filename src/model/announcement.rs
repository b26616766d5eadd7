use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::role::Role;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Audience {
    All,
    Students,
    Teachers,
}

impl Audience {
    pub fn includes(&self, role: Role) -> bool {
        match self {
            Audience::All => true,
            Audience::Students => matches!(role, Role::Student | Role::Admin),
            Audience::Teachers => role.is_staff_member(),
        }
    }

    /// Audience values a role may read, as stored strings.
    pub fn visible_to(role: Role) -> Vec<&'static str> {
        [Audience::All, Audience::Students, Audience::Teachers]
            .into_iter()
            .filter(|a| a.includes(role))
            .map(|a| match a {
                Audience::All => "all",
                Audience::Students => "students",
                Audience::Teachers => "teachers",
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Announcement {
    pub id: String,
    pub school_id: String,
    #[schema(example = "Libur Semester")]
    pub title: String,
    pub content: String,
    #[schema(example = "all")]
    pub audience: String,
    pub created_by: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<NaiveDateTime>,
}
