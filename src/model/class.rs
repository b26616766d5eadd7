use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Class {
    pub id: String,
    pub school_id: String,
    #[schema(example = "X IPA 1")]
    pub name: String,
    #[schema(example = 10)]
    pub grade_level: i32,
    pub homeroom_teacher_id: Option<String>,
    #[schema(example = "2025/2026")]
    pub academic_year: String,
}
