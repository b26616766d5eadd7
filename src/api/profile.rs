use crate::{
    auth::auth::AuthUser,
    error::AppError,
    model::{profile::Profile, role::Role},
    utils::db_utils::{build_update_sql, execute_update, page_offset},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const PROFILE_COLUMNS: &str =
    "id, school_id, full_name, email, role, nis, nip, class_id, phone, created_at";

/// Columns an admin may change through the partial update.
const UPDATABLE_COLUMNS: &[&str] = &["full_name", "phone", "nis", "nip", "class_id"];

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    pub role: Option<Role>,
    pub class_id: Option<String>,
    /// Matches name, email, NIS or NIP
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Documentation shape of the partial update; any subset of these keys.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProfile {
    #[schema(example = "Budi Santoso")]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub nis: Option<String>,
    pub nip: Option<String>,
    pub class_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileListResponse {
    pub data: Vec<Profile>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

async fn fetch_profile(
    pool: &MySqlPool,
    profile_id: &str,
    school_id: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ? AND school_id = ?"
    ))
    .bind(profile_id)
    .bind(school_id)
    .fetch_optional(pool)
    .await
}

/// List profiles of the caller's school
#[utoipa::path(
    get,
    path = "/api/profiles",
    params(ProfileQuery),
    responses(
        (status = 200, body = ProfileListResponse),
        (status = 403, description = "Staff only")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn list_profiles(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProfileQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = page_offset(page, per_page);

    let mut where_sql = String::from(" WHERE school_id = ?");
    let mut args = vec![auth.school_id()?.to_string()];

    if let Some(role) = query.role {
        where_sql.push_str(" AND role = ?");
        args.push(role.to_string());
    }
    if let Some(class_id) = &query.class_id {
        where_sql.push_str(" AND class_id = ?");
        args.push(class_id.clone());
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        where_sql.push_str(" AND (full_name LIKE ? OR email LIKE ? OR nis LIKE ? OR nip LIKE ?)");
        let pattern = format!("%{search}%");
        args.extend(std::iter::repeat_n(pattern, 4));
    }

    let count_sql = format!("SELECT COUNT(*) FROM profiles{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(arg.as_str());
    }
    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to count profiles");
        AppError::from(e)
    })?;

    let data_sql = format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles{} ORDER BY full_name LIMIT ? OFFSET ?",
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, Profile>(&data_sql);
    for arg in &args {
        data_q = data_q.bind(arg.as_str());
    }
    let data = data_q
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch profiles");
            AppError::from(e)
        })?;

    Ok(HttpResponse::Ok().json(ProfileListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/profiles/me",
    responses(
        (status = 200, body = Profile),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_me(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let profile = sqlx::query_as::<_, Profile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"
    ))
    .bind(&auth.user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(HttpResponse::Ok().json(profile))
}

/// Get Profile by ID
#[utoipa::path(
    get,
    path = "/api/profiles/{profile_id}",
    params(("profile_id", Path, description = "Profile ID")),
    responses(
        (status = 200, body = Profile),
        (status = 403, description = "Cannot view other profiles"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let profile_id = path.into_inner();
    if !auth.can_view_profile(&profile_id) {
        return Err(AppError::Forbidden("Cannot view other profiles".into()));
    }

    match fetch_profile(pool.get_ref(), &profile_id, auth.school_id()?).await? {
        Some(profile) => Ok(HttpResponse::Ok().json(profile)),
        None => Err(AppError::NotFound("Profile not found".into())),
    }
}

/// Partially update a profile
#[utoipa::path(
    patch,
    path = "/api/profiles/{profile_id}",
    params(("profile_id", Path, description = "Profile ID")),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = Object, example = json!({
            "message": "Profile updated successfully"
        })),
        (status = 400, description = "Empty payload or field not updatable"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<Value>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let profile_id = path.into_inner();

    if fetch_profile(pool.get_ref(), &profile_id, auth.school_id()?)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Profile not found".into()));
    }

    let update = build_update_sql("profiles", &payload, UPDATABLE_COLUMNS, "id", &profile_id)?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, profile_id, "Failed to update profile");
        AppError::from(e)
    })?;

    info!(profile_id, updated_by = %auth.user_id, "Profile updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_and_email_are_not_updatable() {
        for column in ["role", "email", "school_id", "id"] {
            let mut payload = serde_json::Map::new();
            payload.insert(column.to_string(), json!("x"));
            assert!(
                build_update_sql("profiles", &Value::Object(payload), UPDATABLE_COLUMNS, "id", "p")
                    .is_err(),
                "{column} should be rejected"
            );
        }
        assert!(
            build_update_sql("profiles", &json!({"phone": "0812"}), UPDATABLE_COLUMNS, "id", "p")
                .is_ok()
        );
    }
}
