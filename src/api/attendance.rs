use crate::{
    auth::auth::AuthUser,
    error::{AppError, is_unique_violation},
    geo::{format_distance, validate_location},
    model::{
        attendance::{
            AttendanceError, AttendanceRecord, AttendanceState, AttendanceStatus, AttendanceSummary,
            LocationInput, plan_check_in, plan_check_out, plan_manual_status, summarize,
        },
        role::Role,
    },
    utils::{
        db_utils::page_offset,
        geofence_cache::GeofenceCache,
        realtime::{RealtimeEvent, RealtimeHub, attendance_topic},
    },
};
use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const RECORD_COLUMNS: &str = r#"
    id, profile_id, school_id, date, check_in_time, check_out_time, status,
    latitude, longitude, location_label, distance_m,
    check_out_latitude, check_out_longitude, notes
"#;

const MAX_CLASS_ENTRIES: usize = 200;

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    #[serde(flatten)]
    pub location: LocationInput,
    #[schema(example = "Gerbang utama")]
    pub location_label: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ManualStatusRequest {
    #[schema(example = "sick")]
    pub status: AttendanceStatus,
    #[schema(example = "Demam, surat dokter menyusul")]
    pub notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    #[schema(example = "2026-01-12", value_type = String, format = "date")]
    pub date: NaiveDate,
    /// no_record | checked_in | checked_out | excused
    #[schema(example = "checked_in")]
    pub state: String,
    pub record: Option<AttendanceRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct LocationPreview {
    pub is_valid: bool,
    /// false when the school does not enforce a geofence
    pub enforced: bool,
    pub distance: Option<f64>,
    #[schema(example = "120 m")]
    pub formatted_distance: Option<String>,
    pub radius_m: Option<f64>,
    pub error: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Defaults to the caller; staff may query anyone in their school
    pub profile_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    pub profile_id: Option<String>,
    /// YYYY-MM, defaults to the current month
    #[param(example = "2026-01")]
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub profile_id: String,
    #[schema(example = "2026-01")]
    pub month: String,
    pub summary: AttendanceSummary,
}

#[derive(Deserialize, ToSchema)]
pub struct ClassAttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ClassAttendanceRequest {
    /// Defaults to today
    #[schema(example = "2026-01-12", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    pub entries: Vec<ClassAttendanceEntry>,
}

/// Entries whose `student_id` is not among the school's students.
fn unknown_students<'a>(
    entries: &'a [ClassAttendanceEntry],
    students: &HashSet<String>,
) -> Vec<&'a str> {
    entries
        .iter()
        .map(|entry| entry.student_id.as_str())
        .filter(|id| !students.contains(*id))
        .collect()
}

// Helper enum for typed SQLx binding
enum FilterValue {
    Str(String),
    Date(NaiveDate),
}

fn now_local() -> (NaiveDate, NaiveTime) {
    let now = Local::now();
    let time = now.time().with_nanosecond(0).unwrap_or_else(|| now.time());
    (now.date_naive(), time)
}

async fn fetch_day(
    pool: &MySqlPool,
    profile_id: &str,
    date: NaiveDate,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance WHERE profile_id = ? AND date = ?"
    ))
    .bind(profile_id)
    .bind(date)
    .fetch_optional(pool)
    .await
}

fn publish_change(hub: &RealtimeHub, school_id: &str, event: &str, profile_id: &str, date: NaiveDate) {
    hub.publish(
        &attendance_topic(school_id),
        RealtimeEvent::new(event, json!({ "profile_id": profile_id, "date": date })),
    );
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Check-in berhasil",
            "check_in_time": "07:05:12",
            "distance_m": 42.0
        })),
        (status = 400, description = "Device location missing or unavailable"),
        (status = 403, description = "Outside the school geofence", body = Object, example = json!({
            "message": "Anda berada di luar area sekolah. Jarak Anda 1.2 km, radius yang diizinkan 150 m."
        })),
        (status = 409, description = "Already checked in or out today"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schools: web::Data<GeofenceCache>,
    hub: web::Data<RealtimeHub>,
    payload: web::Json<CheckInRequest>,
) -> Result<HttpResponse, AppError> {
    if !auth.role.self_checks_in() {
        return Err(AppError::Forbidden("Only teachers and staff check in".into()));
    }
    let school_id = auth.school_id()?;
    let (date, time) = now_local();

    let existing = fetch_day(pool.get_ref(), &auth.user_id, date).await?;
    let school = schools
        .school(pool.get_ref(), school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("School not found".into()))?;

    let plan = plan_check_in(
        AttendanceState::of(existing.as_ref()),
        &payload.location,
        school.active_geofence().as_ref(),
    )?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance
        (id, profile_id, school_id, date, check_in_time, status,
         latitude, longitude, location_label, distance_m)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&auth.user_id)
    .bind(school_id)
    .bind(date)
    .bind(time)
    .bind(AttendanceStatus::Present.to_string())
    .bind(plan.coordinate.latitude)
    .bind(plan.coordinate.longitude)
    .bind(&payload.location_label)
    .bind(plan.distance_m)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        // a concurrent check-in won the unique (profile_id, date) key
        if is_unique_violation(&e) {
            return Err(AttendanceError::AlreadyCheckedIn.into());
        }
        error!(error = %e, profile_id = %auth.user_id, "Check-in failed");
        return Err(e.into());
    }

    info!(profile_id = %auth.user_id, distance_m = ?plan.distance_m, "Checked in");
    publish_change(&hub, school_id, "check_in", &auth.user_id, date);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Check-in berhasil",
        "date": date,
        "check_in_time": time,
        "distance_m": plan.distance_m
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = LocationInput,
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Check-out berhasil",
            "check_out_time": "15:01:40"
        })),
        (status = 400, description = "Device location missing or unavailable"),
        (status = 409, description = "No open check-in for today"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<RealtimeHub>,
    payload: web::Json<LocationInput>,
) -> Result<HttpResponse, AppError> {
    let school_id = auth.school_id()?;
    let (date, time) = now_local();

    let existing = fetch_day(pool.get_ref(), &auth.user_id, date).await?;
    let coordinate = plan_check_out(AttendanceState::of(existing.as_ref()), &payload)?;

    // state was CheckedIn, so the record exists
    let record_id = existing.map(|r| r.id).unwrap_or_default();

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out_time = ?, check_out_latitude = ?, check_out_longitude = ?
        WHERE id = ?
        AND check_out_time IS NULL
        "#,
    )
    .bind(time)
    .bind(coordinate.latitude)
    .bind(coordinate.longitude)
    .bind(&record_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, profile_id = %auth.user_id, "Check-out failed");
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AttendanceError::AlreadyCheckedOut.into());
    }

    info!(profile_id = %auth.user_id, "Checked out");
    publish_change(&hub, school_id, "check_out", &auth.user_id, date);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Check-out berhasil",
        "date": date,
        "check_out_time": time
    })))
}

/// Report sick or permission for today
#[utoipa::path(
    post,
    path = "/api/attendance/status",
    request_body = ManualStatusRequest,
    responses(
        (status = 200, description = "Status recorded"),
        (status = 400, description = "Status cannot be self-reported"),
        (status = 409, description = "Attendance already recorded today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<RealtimeHub>,
    payload: web::Json<ManualStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let school_id = auth.school_id()?;
    let (date, _) = now_local();

    let existing = fetch_day(pool.get_ref(), &auth.user_id, date).await?;
    let status = plan_manual_status(AttendanceState::of(existing.as_ref()), payload.status)?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (id, profile_id, school_id, date, status, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&auth.user_id)
    .bind(school_id)
    .bind(date)
    .bind(status.to_string())
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        if is_unique_violation(&e) {
            return Err(AppError::Conflict("Kehadiran hari ini sudah tercatat.".into()));
        }
        error!(error = %e, profile_id = %auth.user_id, "Manual status failed");
        return Err(e.into());
    }

    publish_change(&hub, school_id, "status", &auth.user_id, date);

    Ok(HttpResponse::Ok().json(json!({
        "message": "Status kehadiran tercatat",
        "date": date,
        "status": status
    })))
}

/// Today's record and state for the caller
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses((status = 200, body = TodayResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let (date, _) = now_local();
    let record = fetch_day(pool.get_ref(), &auth.user_id, date).await?;

    Ok(HttpResponse::Ok().json(TodayResponse {
        date,
        state: AttendanceState::of(record.as_ref()).label().to_string(),
        record,
    }))
}

/// Check a position against the caller's school geofence without recording anything
#[utoipa::path(
    post,
    path = "/api/attendance/validate-location",
    request_body = LocationInput,
    responses(
        (status = 200, body = LocationPreview),
        (status = 400, description = "Device location missing or unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn preview_location(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schools: web::Data<GeofenceCache>,
    payload: web::Json<LocationInput>,
) -> Result<HttpResponse, AppError> {
    let coordinate = payload.resolve()?;
    let school = schools
        .school(pool.get_ref(), auth.school_id()?)
        .await?
        .ok_or_else(|| AppError::NotFound("School not found".into()))?;

    let preview = match school.active_geofence() {
        None => LocationPreview {
            is_valid: true,
            enforced: false,
            distance: None,
            formatted_distance: None,
            radius_m: None,
            error: None,
        },
        Some(target) => {
            let check = validate_location(Some(coordinate), Some(&target));
            LocationPreview {
                is_valid: check.is_valid,
                enforced: true,
                formatted_distance: check.distance.map(format_distance),
                distance: check.distance,
                radius_m: Some(target.radius_m),
                error: check.error,
            }
        }
    };

    Ok(HttpResponse::Ok().json(preview))
}

/// Attendance history
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses((status = 200, body = AttendanceListResponse)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let school_id = auth.school_id()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page, per_page);

    let mut where_sql = String::from(" WHERE school_id = ?");
    let mut args = vec![FilterValue::Str(school_id.to_string())];

    match query.profile_id.as_deref() {
        Some(profile_id) => {
            if !auth.can_view_profile(profile_id) {
                return Err(AppError::Forbidden("Cannot view other profiles".into()));
            }
            where_sql.push_str(" AND profile_id = ?");
            args.push(FilterValue::Str(profile_id.to_string()));
        }
        None if !auth.role.is_staff_member() => {
            where_sql.push_str(" AND profile_id = ?");
            args.push(FilterValue::Str(auth.user_id.clone()));
        }
        None => {}
    }

    if let Some(from) = query.from {
        where_sql.push_str(" AND date >= ?");
        args.push(FilterValue::Date(from));
    }
    if let Some(to) = query.to {
        where_sql.push_str(" AND date <= ?");
        args.push(FilterValue::Date(to));
    }

    let count_sql = format!("SELECT COUNT(*) FROM attendance{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::Str(s) => count_q.bind(s.as_str()),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }
    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to count attendance");
        AppError::from(e)
    })?;

    let data_sql = format!(
        "SELECT {RECORD_COLUMNS} FROM attendance{} ORDER BY date DESC, check_in_time DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, AttendanceRecord>(&data_sql);
    for arg in &args {
        data_q = match arg {
            FilterValue::Str(s) => data_q.bind(s.as_str()),
            FilterValue::Date(d) => data_q.bind(*d),
        };
    }
    let data = data_q
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch attendance");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

fn month_bounds(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").ok()?;
    let next = first.checked_add_months(chrono::Months::new(1))?;
    Some((first, next.pred_opt()?))
}

/// One profile's records for a month, never outside the caller's school.
fn monthly_records_sql() -> String {
    format!(
        "SELECT {RECORD_COLUMNS} FROM attendance \
         WHERE profile_id = ? AND school_id = ? AND date BETWEEN ? AND ?"
    )
}

/// Per-status counts for one month
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, body = SummaryResponse),
        (status = 400, description = "Malformed month")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    let profile_id = query.profile_id.clone().unwrap_or_else(|| auth.user_id.clone());
    if !auth.can_view_profile(&profile_id) {
        return Err(AppError::Forbidden("Cannot view other profiles".into()));
    }

    let month = query
        .month
        .clone()
        .unwrap_or_else(|| Local::now().format("%Y-%m").to_string());
    let (first, last) =
        month_bounds(&month).ok_or_else(|| AppError::BadRequest("month must be YYYY-MM".into()))?;

    let records = sqlx::query_as::<_, AttendanceRecord>(&monthly_records_sql())
    .bind(&profile_id)
    .bind(auth.school_id()?)
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(SummaryResponse {
        profile_id,
        month,
        summary: summarize(&records),
    }))
}

/// Record attendance for a class of students
#[utoipa::path(
    post,
    path = "/api/attendance/class",
    request_body = ClassAttendanceRequest,
    responses(
        (status = 200, description = "Entries recorded", body = Object, example = json!({
            "message": "Class attendance recorded",
            "recorded": 32
        })),
        (status = 400, description = "Empty or oversized batch"),
        (status = 403, description = "Teacher/Admin only"),
        (status = 404, description = "A student is not in the caller's school")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_class(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<RealtimeHub>,
    payload: web::Json<ClassAttendanceRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_teacher_or_admin()?;
    let school_id = auth.school_id()?;

    if payload.entries.is_empty() || payload.entries.len() > MAX_CLASS_ENTRIES {
        return Err(AppError::BadRequest(format!(
            "entries must contain 1 to {MAX_CLASS_ENTRIES} students"
        )));
    }

    let date = payload.date.unwrap_or_else(|| now_local().0);

    let placeholders = vec!["?"; payload.entries.len()].join(", ");
    let sql = format!(
        "SELECT id FROM profiles WHERE school_id = ? AND role = ? AND id IN ({placeholders})"
    );
    let mut lookup = sqlx::query_scalar::<_, String>(&sql)
        .bind(school_id)
        .bind(Role::Student.to_string());
    for entry in &payload.entries {
        lookup = lookup.bind(&entry.student_id);
    }
    let students: HashSet<String> = lookup.fetch_all(pool.get_ref()).await?.into_iter().collect();

    let unknown = unknown_students(&payload.entries, &students);
    if !unknown.is_empty() {
        return Err(AppError::NotFound(format!(
            "Students not found in this school: {}",
            unknown.join(", ")
        )));
    }

    // Rows from a self check-in keep their status.
    let mut tx = pool.begin().await?;
    for entry in &payload.entries {
        sqlx::query(
            r#"
            INSERT INTO attendance (id, profile_id, school_id, date, status, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = IF(check_in_time IS NULL, VALUES(status), status),
                notes = IF(check_in_time IS NULL, VALUES(notes), notes)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&entry.student_id)
        .bind(school_id)
        .bind(date)
        .bind(entry.status.to_string())
        .bind(&entry.notes)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, student_id = %entry.student_id, "Class attendance write failed");
            AppError::from(e)
        })?;
    }
    tx.commit().await?;

    info!(recorded_by = %auth.user_id, count = payload.entries.len(), %date, "Class attendance recorded");
    hub.publish(
        &attendance_topic(school_id),
        RealtimeEvent::new("class", json!({ "date": date, "count": payload.entries.len() })),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Class attendance recorded",
        "recorded": payload.entries.len()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_whole_month() {
        let (first, last) = month_bounds("2026-02").unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());

        let (_, december_end) = month_bounds("2025-12").unwrap();
        assert_eq!(december_end, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());

        assert!(month_bounds("2026-13").is_none());
        assert!(month_bounds("januari").is_none());
    }

    fn entry(student_id: &str) -> ClassAttendanceEntry {
        ClassAttendanceEntry {
            student_id: student_id.into(),
            status: AttendanceStatus::Absent,
            notes: None,
        }
    }

    #[test]
    fn monthly_records_are_school_scoped() {
        let sql = monthly_records_sql();
        assert!(sql.contains("profile_id = ? AND school_id = ?"));
        assert_eq!(sql.matches('?').count(), 4);
    }

    #[test]
    fn roll_call_rejects_profiles_outside_school_roster() {
        let roster: HashSet<String> = ["s-1", "s-2"].into_iter().map(String::from).collect();

        let entries = vec![entry("s-1"), entry("s-2")];
        assert!(unknown_students(&entries, &roster).is_empty());

        let entries = vec![entry("s-1"), entry("teacher-other-school"), entry("s-9")];
        assert_eq!(
            unknown_students(&entries, &roster),
            vec!["teacher-other-school", "s-9"]
        );
    }

    #[test]
    fn check_in_body_accepts_flattened_location() {
        let body: CheckInRequest = serde_json::from_value(json!({
            "location": {"latitude": -6.9, "longitude": 107.6, "accuracy": 12.0},
            "location_label": "Gerbang utama"
        }))
        .unwrap();
        assert!(body.location.resolve().is_ok());

        let body: CheckInRequest = serde_json::from_value(json!({
            "location_error": "timeout"
        }))
        .unwrap();
        assert_eq!(
            body.location.resolve(),
            Err(AttendanceError::Geolocation(
                crate::model::attendance::GeolocationFailure::Timeout
            ))
        );
    }
}
