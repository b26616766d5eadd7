use crate::{
    api::notification::notify,
    auth::auth::AuthUser,
    error::AppError,
    model::{
        grade::{AssessmentType, Grade, ReportCard, is_valid_score, report_card},
        role::Role,
    },
    utils::{db_utils::page_offset, realtime::RealtimeHub},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const GRADE_COLUMNS: &str = r#"
    g.id, g.student_id, g.subject_id, g.class_id, g.semester, g.academic_year,
    g.assessment_type, g.score, g.notes, g.recorded_by, g.created_at
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateGrade {
    pub student_id: String,
    pub subject_id: String,
    pub class_id: Option<String>,
    #[schema(example = 1)]
    pub semester: i32,
    #[schema(example = "2025/2026")]
    pub academic_year: String,
    pub assessment_type: AssessmentType,
    #[schema(example = 88.0)]
    pub score: f64,
    pub notes: Option<String>,
}

impl CreateGrade {
    fn validate(&self) -> Result<(), AppError> {
        if !is_valid_score(self.score) {
            return Err(AppError::BadRequest("score must be between 0 and 100".into()));
        }
        if !matches!(self.semester, 1 | 2) {
            return Err(AppError::BadRequest("semester must be 1 or 2".into()));
        }
        Ok(())
    }
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateGrade {
    #[schema(example = 91.0)]
    pub score: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GradeQuery {
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    pub class_id: Option<String>,
    pub semester: Option<i32>,
    pub academic_year: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportCardQuery {
    pub semester: Option<i32>,
    #[param(example = "2025/2026")]
    pub academic_year: Option<String>,
}

enum FilterValue {
    Str(String),
    Int(i32),
}

/// Record a grade
#[utoipa::path(
    post,
    path = "/api/grades",
    request_body = CreateGrade,
    responses(
        (status = 201, description = "Grade recorded", body = Object, example = json!({
            "message": "Grade recorded successfully",
            "id": "3f1b4c2d-6a7e-4b8c-9d0e-1f2a3b4c5d6e"
        })),
        (status = 400, description = "Score out of range"),
        (status = 403, description = "Teacher/Admin only"),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Grade"
)]
pub async fn create_grade(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<RealtimeHub>,
    payload: web::Json<CreateGrade>,
) -> Result<HttpResponse, AppError> {
    auth.require_teacher_or_admin()?;
    payload.validate()?;

    let student_in_school = sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(SELECT 1 FROM profiles WHERE id = ? AND school_id = ? AND role = ?)"#,
    )
    .bind(&payload.student_id)
    .bind(auth.school_id()?)
    .bind(Role::Student.to_string())
    .fetch_one(pool.get_ref())
    .await?;

    if !student_in_school {
        return Err(AppError::NotFound("Student not found".into()));
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO grades
        (id, student_id, subject_id, class_id, semester, academic_year,
         assessment_type, score, notes, recorded_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&payload.student_id)
    .bind(&payload.subject_id)
    .bind(&payload.class_id)
    .bind(payload.semester)
    .bind(&payload.academic_year)
    .bind(payload.assessment_type.to_string())
    .bind(payload.score)
    .bind(&payload.notes)
    .bind(&auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, student_id = %payload.student_id, "Failed to record grade");
        AppError::from(e)
    })?;

    info!(grade_id = %id, student_id = %payload.student_id, "Grade recorded");

    // the grade is already stored; a lost notification is not worth failing for
    if let Err(e) = notify(
        pool.get_ref(),
        &hub,
        &payload.student_id,
        "Nilai baru",
        &format!(
            "Nilai {} Anda telah diinput: {}",
            payload.assessment_type, payload.score
        ),
        "grade",
    )
    .await
    {
        warn!(error = %e, student_id = %payload.student_id, "Grade notification failed");
    }

    Ok(HttpResponse::Created().json(json!({
        "message": "Grade recorded successfully",
        "id": id
    })))
}

/// List grades. Students only ever see their own.
#[utoipa::path(
    get,
    path = "/api/grades",
    params(GradeQuery),
    responses((status = 200, body = [Grade])),
    security(("bearer_auth" = [])),
    tag = "Grade"
)]
pub async fn list_grades(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<GradeQuery>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);

    let mut where_sql = String::from(" WHERE p.school_id = ?");
    let mut args = vec![FilterValue::Str(auth.school_id()?.to_string())];

    let student_id = if auth.role == Role::Student {
        Some(auth.user_id.clone())
    } else {
        query.student_id.clone()
    };

    if let Some(student_id) = student_id {
        where_sql.push_str(" AND g.student_id = ?");
        args.push(FilterValue::Str(student_id));
    }
    if let Some(subject_id) = &query.subject_id {
        where_sql.push_str(" AND g.subject_id = ?");
        args.push(FilterValue::Str(subject_id.clone()));
    }
    if let Some(class_id) = &query.class_id {
        where_sql.push_str(" AND g.class_id = ?");
        args.push(FilterValue::Str(class_id.clone()));
    }
    if let Some(semester) = query.semester {
        where_sql.push_str(" AND g.semester = ?");
        args.push(FilterValue::Int(semester));
    }
    if let Some(year) = &query.academic_year {
        where_sql.push_str(" AND g.academic_year = ?");
        args.push(FilterValue::Str(year.clone()));
    }

    let sql = format!(
        "SELECT {GRADE_COLUMNS} FROM grades g JOIN profiles p ON p.id = g.student_id{where_sql} \
         ORDER BY g.created_at DESC LIMIT ? OFFSET ?"
    );
    let mut q = sqlx::query_as::<_, Grade>(&sql);
    for arg in &args {
        q = match arg {
            FilterValue::Str(s) => q.bind(s.as_str()),
            FilterValue::Int(i) => q.bind(*i),
        };
    }

    let grades = q
        .bind(per_page as i64)
        .bind(page_offset(page, per_page))
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch grades");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(grades))
}

/// Correct a grade's score or notes
#[utoipa::path(
    put,
    path = "/api/grades/{grade_id}",
    params(("grade_id", Path, description = "Grade ID")),
    request_body = UpdateGrade,
    responses(
        (status = 200, description = "Grade updated"),
        (status = 400, description = "Nothing to update or score out of range"),
        (status = 404, description = "Grade not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Grade"
)]
pub async fn update_grade(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<UpdateGrade>,
) -> Result<HttpResponse, AppError> {
    auth.require_teacher_or_admin()?;
    let grade_id = path.into_inner();

    if payload.score.is_none() && payload.notes.is_none() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }
    if payload.score.is_some_and(|score| !is_valid_score(score)) {
        return Err(AppError::BadRequest("score must be between 0 and 100".into()));
    }

    let affected = sqlx::query(
        r#"
        UPDATE grades g JOIN profiles p ON p.id = g.student_id
        SET g.score = COALESCE(?, g.score), g.notes = COALESCE(?, g.notes)
        WHERE g.id = ? AND p.school_id = ?
        "#,
    )
    .bind(payload.score)
    .bind(&payload.notes)
    .bind(&grade_id)
    .bind(auth.school_id()?)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("Grade not found".into()));
    }

    info!(grade_id, updated_by = %auth.user_id, "Grade updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Grade updated successfully" })))
}

/// Delete a grade
#[utoipa::path(
    delete,
    path = "/api/grades/{grade_id}",
    params(("grade_id", Path, description = "Grade ID")),
    responses(
        (status = 200, description = "Grade deleted"),
        (status = 404, description = "Grade not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Grade"
)]
pub async fn delete_grade(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    auth.require_teacher_or_admin()?;
    let grade_id = path.into_inner();

    let affected = sqlx::query(
        r#"
        DELETE g FROM grades g JOIN profiles p ON p.id = g.student_id
        WHERE g.id = ? AND p.school_id = ?
        "#,
    )
    .bind(&grade_id)
    .bind(auth.school_id()?)
    .execute(pool.get_ref())
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound("Grade not found".into()));
    }

    info!(grade_id, deleted_by = %auth.user_id, "Grade deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Grade deleted successfully" })))
}

/// Per-subject averages with letter predicates
#[utoipa::path(
    get,
    path = "/api/grades/report/{student_id}",
    params(("student_id", Path, description = "Student profile ID"), ReportCardQuery),
    responses(
        (status = 200, body = ReportCard),
        (status = 403, description = "Not your report card")
    ),
    security(("bearer_auth" = [])),
    tag = "Grade"
)]
pub async fn get_report_card(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    query: web::Query<ReportCardQuery>,
) -> Result<HttpResponse, AppError> {
    let student_id = path.into_inner();
    if !auth.can_view_profile(&student_id) {
        return Err(AppError::Forbidden("Cannot view other report cards".into()));
    }

    let mut sql = format!(
        "SELECT {GRADE_COLUMNS} FROM grades g JOIN profiles p ON p.id = g.student_id \
         WHERE g.student_id = ? AND p.school_id = ?"
    );
    if query.semester.is_some() {
        sql.push_str(" AND g.semester = ?");
    }
    if query.academic_year.is_some() {
        sql.push_str(" AND g.academic_year = ?");
    }

    let mut q = sqlx::query_as::<_, Grade>(&sql)
        .bind(&student_id)
        .bind(auth.school_id()?);
    if let Some(semester) = query.semester {
        q = q.bind(semester);
    }
    if let Some(year) = &query.academic_year {
        q = q.bind(year.as_str());
    }

    let grades = q.fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(report_card(&student_id, &grades)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(score: f64, semester: i32) -> CreateGrade {
        serde_json::from_value(json!({
            "student_id": "st",
            "subject_id": "mtk",
            "semester": semester,
            "academic_year": "2025/2026",
            "assessment_type": "midterm",
            "score": score
        }))
        .unwrap()
    }

    #[test]
    fn validates_score_and_semester() {
        assert!(body(100.0, 1).validate().is_ok());
        assert!(body(0.0, 2).validate().is_ok());
        assert!(body(101.0, 1).validate().is_err());
        assert!(body(-1.0, 1).validate().is_err());
        assert!(body(80.0, 3).validate().is_err());
    }

    #[test]
    fn rejects_unknown_assessment_type() {
        let parsed = serde_json::from_value::<CreateGrade>(json!({
            "student_id": "st",
            "subject_id": "mtk",
            "semester": 1,
            "academic_year": "2025/2026",
            "assessment_type": "quiz",
            "score": 80
        }));
        assert!(parsed.is_err());
    }
}
