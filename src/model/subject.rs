use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Subject {
    pub id: String,
    pub school_id: String,
    #[schema(example = "MTK")]
    pub code: String,
    #[schema(example = "Matematika")]
    pub name: String,
}
