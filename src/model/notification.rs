use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: String,
    pub profile_id: String,
    #[schema(example = "Nilai baru")]
    pub title: String,
    pub message: String,
    /// grade | announcement | attendance | system
    #[schema(example = "grade")]
    pub kind: String,
    pub is_read: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
