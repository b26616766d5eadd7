use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::notification::Notification,
    utils::realtime::{RealtimeEvent, RealtimeHub, notifications_topic},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, Executor};
use tracing::error;
use utoipa::IntoParams;
use uuid::Uuid;

/// Stores a notification for `profile_id` and pushes it to any open stream.
pub async fn notify<'e, E>(
    executor: E,
    hub: &RealtimeHub,
    profile_id: &str,
    title: &str,
    message: &str,
    kind: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = MySql>,
{
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO notifications (id, profile_id, title, message, kind, is_read)
        VALUES (?, ?, ?, ?, ?, FALSE)
        "#,
    )
    .bind(&id)
    .bind(profile_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .execute(executor)
    .await?;

    hub.publish(
        &notifications_topic(profile_id),
        RealtimeEvent::new(
            "notification",
            json!({ "id": id, "title": title, "message": message, "kind": kind }),
        ),
    );
    Ok(())
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only unread notifications when true
    pub unread: Option<bool>,
    pub limit: Option<u32>,
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    responses((status = 200, body = [Notification])),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let unread_clause = if query.unread.unwrap_or(false) {
        " AND is_read = FALSE"
    } else {
        ""
    };

    let sql = format!(
        "SELECT id, profile_id, title, message, kind, is_read, created_at \
         FROM notifications WHERE profile_id = ?{unread_clause} \
         ORDER BY created_at DESC LIMIT ?"
    );

    let notifications = sqlx::query_as::<_, Notification>(&sql)
        .bind(&auth.user_id)
        .bind(limit as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, profile_id = %auth.user_id, "Failed to fetch notifications");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(notifications))
}

/// Mark one notification as read
#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/read",
    params(("notification_id", Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let notification_id = path.into_inner();

    // scoped to the owner so nobody can touch another profile's inbox
    let affected = sqlx::query(
        r#"UPDATE notifications SET is_read = TRUE WHERE id = ? AND profile_id = ?"#,
    )
    .bind(&notification_id)
    .bind(&auth.user_id)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if affected == 0 {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM notifications WHERE id = ? AND profile_id = ?)"#,
        )
        .bind(&notification_id)
        .bind(&auth.user_id)
        .fetch_one(pool.get_ref())
        .await?;

        if !exists {
            return Err(AppError::NotFound("Notification not found".into()));
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Notification marked as read" })))
}

/// Mark every notification of the caller as read
#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    responses((status = 200, description = "All marked as read", body = Object, example = json!({
        "message": "All notifications marked as read",
        "updated": 4
    }))),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn mark_all_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, AppError> {
    let updated = sqlx::query(
        r#"UPDATE notifications SET is_read = TRUE WHERE profile_id = ? AND is_read = FALSE"#,
    )
    .bind(&auth.user_id)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    Ok(HttpResponse::Ok().json(json!({
        "message": "All notifications marked as read",
        "updated": updated
    })))
}
