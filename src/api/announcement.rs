use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::announcement::{Announcement, Audience},
    utils::realtime::{RealtimeEvent, RealtimeHub, announcements_topic},
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, ToSchema)]
pub struct CreateAnnouncement {
    #[schema(example = "Libur Semester")]
    pub title: String,
    #[schema(example = "Kegiatan belajar mengajar libur mulai 20 Desember.")]
    pub content: String,
    pub audience: Audience,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<NaiveDateTime>,
}

/// Publish an announcement to the school
#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = CreateAnnouncement,
    responses(
        (status = 201, description = "Announcement published"),
        (status = 400, description = "Missing title/content or expiry in the past"),
        (status = 403, description = "Teacher/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcement"
)]
pub async fn create_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<RealtimeHub>,
    payload: web::Json<CreateAnnouncement>,
) -> Result<HttpResponse, AppError> {
    auth.require_teacher_or_admin()?;
    let school_id = auth.school_id()?;

    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(AppError::BadRequest("title and content are required".into()));
    }
    let now = Local::now().naive_local();
    if payload.expires_at.is_some_and(|at| at <= now) {
        return Err(AppError::BadRequest("expires_at must be in the future".into()));
    }

    let announcement = Announcement {
        id: Uuid::new_v4().to_string(),
        school_id: school_id.to_string(),
        title: payload.title.trim().to_string(),
        content: payload.content.clone(),
        audience: payload.audience.to_string(),
        created_by: auth.user_id.clone(),
        created_at: now,
        expires_at: payload.expires_at,
    };

    sqlx::query(
        r#"
        INSERT INTO announcements
        (id, school_id, title, content, audience, created_by, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&announcement.id)
    .bind(&announcement.school_id)
    .bind(&announcement.title)
    .bind(&announcement.content)
    .bind(&announcement.audience)
    .bind(&announcement.created_by)
    .bind(announcement.created_at)
    .bind(announcement.expires_at)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create announcement");
        AppError::from(e)
    })?;

    let reached = hub.publish(
        &announcements_topic(school_id),
        RealtimeEvent::new("announcement", &announcement),
    );
    info!(announcement_id = %announcement.id, reached, "Announcement published");

    Ok(HttpResponse::Created().json(json!({
        "message": "Announcement published successfully",
        "id": announcement.id
    })))
}

/// Active announcements addressed to the caller's role
#[utoipa::path(
    get,
    path = "/api/announcements",
    responses((status = 200, body = [Announcement])),
    security(("bearer_auth" = [])),
    tag = "Announcement"
)]
pub async fn list_announcements(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let audiences = Audience::visible_to(auth.role);
    let placeholders = vec!["?"; audiences.len()].join(", ");

    let sql = format!(
        "SELECT id, school_id, title, content, audience, created_by, created_at, expires_at \
         FROM announcements \
         WHERE school_id = ? AND audience IN ({placeholders}) \
         AND (expires_at IS NULL OR expires_at > ?) \
         ORDER BY created_at DESC"
    );

    let mut q = sqlx::query_as::<_, Announcement>(&sql).bind(auth.school_id()?);
    for audience in audiences {
        q = q.bind(audience);
    }

    let announcements = q
        .bind(Local::now().naive_local())
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch announcements");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(announcements))
}

/// Delete an announcement
#[utoipa::path(
    delete,
    path = "/api/announcements/{announcement_id}",
    params(("announcement_id", Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Announcement deleted"),
        (status = 404, description = "Announcement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Announcement"
)]
pub async fn delete_announcement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_teacher_or_admin()?;

    let affected = sqlx::query(r#"DELETE FROM announcements WHERE id = ? AND school_id = ?"#)
        .bind(path.into_inner())
        .bind(auth.school_id()?)
        .execute(pool.get_ref())
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("Announcement not found".into()));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Announcement deleted successfully" })))
}
