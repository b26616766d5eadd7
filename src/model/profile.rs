use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": "9b2e7c1a-7d0e-4c8e-8d56-2b1f3e4a5c6d",
        "school_id": "5d0f5a8e-3c55-4a4b-9a57-0f2f6f0f6a11",
        "full_name": "Siti Rahmawati",
        "email": "siti@sman1.sch.id",
        "role": "teacher",
        "nis": null,
        "nip": "198703122010012005",
        "class_id": null,
        "phone": "+6281234567890",
        "created_at": "2026-01-05T08:00:00"
    })
)]
pub struct Profile {
    pub id: String,
    pub school_id: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    /// Student registration number
    pub nis: Option<String>,
    /// Teacher registration number
    pub nip: Option<String>,
    pub class_id: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}
