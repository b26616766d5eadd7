use crate::{auth::auth::AuthUser, error::{AppError, is_unique_violation}, model::subject::Subject};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct CreateSubject {
    #[schema(example = "MTK")]
    pub code: String,
    #[schema(example = "Matematika")]
    pub name: String,
}

/// Create Subject
#[utoipa::path(
    post,
    path = "/api/subjects",
    request_body = CreateSubject,
    responses(
        (status = 201, description = "Subject created"),
        (status = 409, description = "Subject code already used"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Subject"
)]
pub async fn create_subject(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSubject>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let school_id = auth.school_id()?;

    let code = payload.code.trim().to_uppercase();
    if code.is_empty() || payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("code and name are required".into()));
    }

    let id = Uuid::new_v4().to_string();
    let result = sqlx::query(
        r#"INSERT INTO subjects (id, school_id, code, name) VALUES (?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(school_id)
    .bind(&code)
    .bind(payload.name.trim())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Created().json(json!({
            "message": "Subject created successfully",
            "id": id
        }))),
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::Conflict(format!("Subject code {code} already exists")))
        }
        Err(e) => {
            error!(error = %e, "Failed to create subject");
            Err(e.into())
        }
    }
}

/// List Subjects of the caller's school
#[utoipa::path(
    get,
    path = "/api/subjects",
    responses((status = 200, body = [Subject])),
    security(("bearer_auth" = [])),
    tag = "Subject"
)]
pub async fn list_subjects(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let subjects = sqlx::query_as::<_, Subject>(
        r#"SELECT id, school_id, code, name FROM subjects WHERE school_id = ? ORDER BY name"#,
    )
    .bind(auth.school_id()?)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(subjects))
}
