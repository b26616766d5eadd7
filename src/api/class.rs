use crate::{auth::auth::AuthUser, error::AppError, model::class::Class};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct CreateClass {
    #[schema(example = "X IPA 1")]
    pub name: String,
    #[schema(example = 10)]
    pub grade_level: i32,
    pub homeroom_teacher_id: Option<String>,
    #[schema(example = "2025/2026")]
    pub academic_year: String,
}

/// Create Class
#[utoipa::path(
    post,
    path = "/api/classes",
    request_body = CreateClass,
    responses(
        (status = 201, description = "Class created", body = Object, example = json!({
            "message": "Class created successfully",
            "id": "0b5f2c8e-1d3a-4f7e-9a2b-6c1d8e3f4a5b"
        })),
        (status = 400, description = "Invalid grade level"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Class"
)]
pub async fn create_class(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateClass>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let school_id = auth.school_id()?;

    if !(1..=12).contains(&payload.grade_level) || payload.name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "name is required and grade_level must be 1..12".into(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO classes (id, school_id, name, grade_level, homeroom_teacher_id, academic_year)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(school_id)
    .bind(payload.name.trim())
    .bind(payload.grade_level)
    .bind(&payload.homeroom_teacher_id)
    .bind(&payload.academic_year)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create class");
        AppError::from(e)
    })?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Class created successfully",
        "id": id
    })))
}

/// List Classes of the caller's school
#[utoipa::path(
    get,
    path = "/api/classes",
    responses((status = 200, body = [Class])),
    security(("bearer_auth" = [])),
    tag = "Class"
)]
pub async fn list_classes(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let classes = sqlx::query_as::<_, Class>(
        r#"
        SELECT id, school_id, name, grade_level, homeroom_teacher_id, academic_year
        FROM classes
        WHERE school_id = ?
        ORDER BY grade_level, name
        "#,
    )
    .bind(auth.school_id()?)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(classes))
}
