use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    geo::schedule::is_within_schedule_time,
    model::{
        role::Role,
        schedule::{Schedule, is_valid_day, iso_day_of_week, weekday_name},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const SCHEDULE_COLUMNS: &str =
    "sc.id, sc.class_id, sc.subject_id, sc.teacher_id, sc.day_of_week, sc.start_time, sc.end_time, sc.room";

#[derive(Deserialize, ToSchema)]
pub struct CreateSchedule {
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    #[schema(example = 1)]
    pub day_of_week: i32,
    #[schema(example = "07:30:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "09:00:00", value_type = String)]
    pub end_time: NaiveTime,
    pub room: Option<String>,
}

impl CreateSchedule {
    fn validate(&self) -> Result<(), AppError> {
        if !is_valid_day(self.day_of_week) {
            return Err(AppError::BadRequest("day_of_week must be 1 (Monday) to 7".into()));
        }
        if self.start_time >= self.end_time {
            return Err(AppError::BadRequest("start_time must be before end_time".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
    pub day_of_week: Option<i32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    #[param(example = "08:00")]
    pub start: String,
    #[param(example = "09:00")]
    pub end: String,
    /// Minutes allowed on both sides, defaults to the server setting
    #[param(maximum = 1440)]
    pub buffer: Option<u32>,
}

pub const MAX_BUFFER_MINUTES: u32 = 24 * 60;

impl WindowQuery {
    pub fn buffer_or(&self, default: u32) -> Result<u32, AppError> {
        match self.buffer {
            Some(buffer) if buffer > MAX_BUFFER_MINUTES => Err(AppError::BadRequest(format!(
                "buffer must be at most {MAX_BUFFER_MINUTES} minutes"
            ))),
            Some(buffer) => Ok(buffer),
            None => Ok(default),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CurrentSchedule {
    #[serde(flatten)]
    pub schedule: Schedule,
    #[schema(example = "Senin")]
    pub day_name: String,
    /// Within the lesson window, including the buffer on both sides
    pub is_active: bool,
}

/// Create a schedule slot
#[utoipa::path(
    post,
    path = "/api/schedules",
    request_body = CreateSchedule,
    responses(
        (status = 201, description = "Schedule created"),
        (status = 400, description = "Invalid day or time range"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn create_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSchedule>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    payload.validate()?;

    let class_in_school = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(SELECT 1 FROM classes WHERE id = ? AND school_id = ?)"#,
    )
    .bind(&payload.class_id)
    .bind(auth.school_id()?)
    .fetch_one(pool.get_ref())
    .await?;

    if !class_in_school {
        return Err(AppError::NotFound("Class not found".into()));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO schedules
        (id, class_id, subject_id, teacher_id, day_of_week, start_time, end_time, room)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&payload.class_id)
    .bind(&payload.subject_id)
    .bind(&payload.teacher_id)
    .bind(payload.day_of_week)
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(&payload.room)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create schedule");
        AppError::from(e)
    })?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Schedule created successfully",
        "id": id
    })))
}

/// List schedule slots of the caller's school
#[utoipa::path(
    get,
    path = "/api/schedules",
    params(ScheduleQuery),
    responses((status = 200, body = [Schedule])),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn list_schedules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ScheduleQuery>,
) -> Result<HttpResponse, AppError> {
    let mut sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules sc JOIN classes c ON c.id = sc.class_id \
         WHERE c.school_id = ?"
    );
    if query.class_id.is_some() {
        sql.push_str(" AND sc.class_id = ?");
    }
    if query.teacher_id.is_some() {
        sql.push_str(" AND sc.teacher_id = ?");
    }
    if query.day_of_week.is_some() {
        sql.push_str(" AND sc.day_of_week = ?");
    }
    sql.push_str(" ORDER BY sc.day_of_week, sc.start_time");

    let mut q = sqlx::query_as::<_, Schedule>(&sql).bind(auth.school_id()?);
    if let Some(class_id) = &query.class_id {
        q = q.bind(class_id.as_str());
    }
    if let Some(teacher_id) = &query.teacher_id {
        q = q.bind(teacher_id.as_str());
    }
    if let Some(day) = query.day_of_week {
        q = q.bind(day);
    }

    let schedules = q.fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(schedules))
}

/// Delete a schedule slot
#[utoipa::path(
    delete,
    path = "/api/schedules/{schedule_id}",
    params(("schedule_id", Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule deleted"),
        (status = 404, description = "Schedule not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn delete_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;

    let affected = sqlx::query(
        r#"
        DELETE sc FROM schedules sc JOIN classes c ON c.id = sc.class_id
        WHERE sc.id = ? AND c.school_id = ?
        "#,
    )
    .bind(path.into_inner())
    .bind(auth.school_id()?)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("Schedule not found".into()));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Schedule deleted successfully" })))
}

fn annotate(schedules: Vec<Schedule>, now: NaiveTime, buffer_minutes: u32) -> Vec<CurrentSchedule> {
    schedules
        .into_iter()
        .map(|schedule| CurrentSchedule {
            day_name: weekday_name(schedule.day_of_week).unwrap_or_default().to_string(),
            is_active: schedule.is_active_at(now, buffer_minutes),
            schedule,
        })
        .collect()
}

/// Today's lessons for the caller, flagged when they are happening now
#[utoipa::path(
    get,
    path = "/api/schedules/today",
    responses((status = 200, body = [CurrentSchedule])),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn today_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let now = Local::now();
    let day = iso_day_of_week(now.date_naive());

    // students follow their class, teachers their own slots, admins see the school
    let (filter, value) = match auth.role {
        Role::Student => {
            let class_id = sqlx::query_scalar::<_, Option<String>>(
                r#"SELECT class_id FROM profiles WHERE id = ?"#,
            )
            .bind(&auth.user_id)
            .fetch_optional(pool.get_ref())
            .await?
            .flatten()
            .ok_or_else(|| AppError::NotFound("No class assigned".into()))?;
            (" AND sc.class_id = ?", class_id)
        }
        Role::Teacher => (" AND sc.teacher_id = ?", auth.user_id.clone()),
        Role::Admin | Role::Staff => (" AND c.school_id = ?", auth.school_id()?.to_string()),
    };

    let sql = format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules sc JOIN classes c ON c.id = sc.class_id \
         WHERE c.school_id = ? AND sc.day_of_week = ?{filter} ORDER BY sc.start_time"
    );
    let schedules = sqlx::query_as::<_, Schedule>(&sql)
        .bind(auth.school_id()?)
        .bind(day)
        .bind(value)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(annotate(schedules, now.time(), config.schedule_buffer_minutes)))
}

/// Whether the local clock falls inside an HH:MM lesson window
#[utoipa::path(
    get,
    path = "/api/schedules/window",
    params(WindowQuery),
    responses(
        (status = 200, description = "Window check", body = Object, example = json!({
            "within": true,
            "buffer_minutes": 15
        })),
        (status = 400, description = "Malformed time or buffer too large")
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn check_window(
    _auth: AuthUser,
    config: web::Data<Config>,
    query: web::Query<WindowQuery>,
) -> Result<HttpResponse, AppError> {
    let buffer = query.buffer_or(config.schedule_buffer_minutes)?;
    let within = is_within_schedule_time(&query.start, &query.end, Some(buffer))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "within": within,
        "buffer_minutes": buffer
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn create(day: i32, start: &str, end: &str) -> CreateSchedule {
        CreateSchedule {
            class_id: "c".into(),
            subject_id: "s".into(),
            teacher_id: "t".into(),
            day_of_week: day,
            start_time: t(start),
            end_time: t(end),
            room: None,
        }
    }

    fn window(buffer: Option<u32>) -> WindowQuery {
        WindowQuery {
            start: "08:00".into(),
            end: "09:00".into(),
            buffer,
        }
    }

    #[test]
    fn window_buffer_is_bounded() {
        assert_eq!(window(None).buffer_or(15).unwrap(), 15);
        assert_eq!(window(Some(0)).buffer_or(15).unwrap(), 0);
        assert_eq!(window(Some(1440)).buffer_or(15).unwrap(), 1440);
        assert!(matches!(
            window(Some(1441)).buffer_or(15),
            Err(AppError::BadRequest(_))
        ));
        assert!(window(Some(u32::MAX)).buffer_or(15).is_err());
    }

    #[test]
    fn validates_day_and_range() {
        assert!(create(1, "07:30", "09:00").validate().is_ok());
        assert!(create(0, "07:30", "09:00").validate().is_err());
        assert!(create(8, "07:30", "09:00").validate().is_err());
        assert!(create(2, "09:00", "09:00").validate().is_err());
        assert!(create(2, "10:00", "09:00").validate().is_err());
    }

    #[test]
    fn annotates_active_lessons() {
        let slot = |start: &str, end: &str| Schedule {
            id: format!("{start}-{end}"),
            class_id: "c".into(),
            subject_id: "s".into(),
            teacher_id: "t".into(),
            day_of_week: 5,
            start_time: t(start),
            end_time: t(end),
            room: None,
        };

        let annotated = annotate(
            vec![slot("08:00", "09:00"), slot("10:00", "11:00")],
            t("07:50"),
            15,
        );

        assert_eq!(annotated[0].day_name, "Jumat");
        assert!(annotated[0].is_active);
        assert!(!annotated[1].is_active);
    }
}
