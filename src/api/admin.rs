use std::collections::HashSet;

use crate::{
    auth::password::{MIN_PASSWORD_LEN, hash_password, is_acceptable_password},
    config::Config,
    error::{AppError, is_foreign_key_violation, is_unique_violation},
    model::{role::Role, user::UserCredential},
    utils::{
        email_filter::{EmailRegistry, normalize},
        rate_limiter::{FixedWindowLimiter, RateDecision, RateLimitPolicy, client_identifier},
    },
};
use actix_web::{HttpRequest, HttpResponse, web};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";
const MAX_IMPORT_ROWS: usize = 500;
const MAX_EMAIL_RECIPIENTS: usize = 100;

/// Shared secret first, then the endpoint's fixed-window budget for this client.
fn admin_guard(
    req: &HttpRequest,
    config: &Config,
    limiter: &FixedWindowLimiter,
    policy: RateLimitPolicy,
    endpoint: &str,
) -> Result<(), AppError> {
    let provided = req
        .headers()
        .get(ADMIN_SECRET_HEADER)
        .map(|h| h.as_bytes())
        .unwrap_or_default();

    if !bool::from(provided.ct_eq(config.admin_secret.as_bytes())) {
        warn!(endpoint, "Rejected admin call with a bad secret");
        return Err(AppError::Unauthorized("Invalid admin secret".into()));
    }

    let key = format!("{endpoint}:{}", client_identifier(req));
    match limiter.check(&key, policy) {
        RateDecision::Allowed { .. } => Ok(()),
        RateDecision::Limited { retry_after } => {
            warn!(key, "Admin endpoint rate limited");
            Err(AppError::RateLimited {
                retry_after_secs: retry_after.as_millis().div_ceil(1000).max(1) as u64,
            })
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Argon2 is CPU bound, so it runs on the blocking pool.
async fn hash_blocking(password: String) -> Result<String, AppError> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(anyhow!("hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(anyhow!("password hashing failed: {e}")))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "siti@sman1.sch.id")]
    pub email: String,
    #[schema(example = "rahasia123")]
    pub password: String,
    #[schema(example = "Siti Rahmawati")]
    pub full_name: String,
    pub role: Role,
    pub school_id: String,
    pub nis: Option<String>,
    pub nip: Option<String>,
    pub class_id: Option<String>,
    pub phone: Option<String>,
}

impl CreateUserRequest {
    fn validate(&self) -> Result<(), AppError> {
        if !is_plausible_email(self.email.trim()) {
            return Err(AppError::BadRequest("A valid email is required".into()));
        }
        if !is_acceptable_password(&self.password) {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.full_name.trim().is_empty() {
            return Err(AppError::BadRequest("full_name is required".into()));
        }
        Ok(())
    }
}

struct NewAccount<'a> {
    email: String,
    password_hash: String,
    full_name: &'a str,
    role: Role,
    school_id: &'a str,
    nis: Option<&'a str>,
    nip: Option<&'a str>,
    class_id: Option<&'a str>,
    phone: Option<&'a str>,
}

/// Credential and profile share one id and are written together.
async fn insert_account(pool: &MySqlPool, account: &NewAccount<'_>) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let mut tx = pool.begin().await?;

    sqlx::query(r#"INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)"#)
        .bind(&id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO profiles (id, school_id, full_name, email, role, nis, nip, class_id, phone)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(account.school_id)
    .bind(account.full_name)
    .bind(&account.email)
    .bind(account.role.to_string())
    .bind(account.nis)
    .bind(account.nip)
    .bind(account.class_id)
    .bind(account.phone)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

async fn fetch_credential(pool: &MySqlPool, user_id: &str) -> Result<UserCredential, AppError> {
    sqlx::query_as::<_, UserCredential>(
        r#"SELECT id, email, password_hash FROM users WHERE id = ?"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Create a user account and profile
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUserRequest,
    params(("x-admin-secret" = String, Header, description = "Admin shared secret")),
    responses(
        (status = 201, description = "User created", body = Object, example = json!({
            "message": "User created successfully",
            "id": "9b2e7c1a-7d0e-4c8e-8d56-2b1f3e4a5c6d"
        })),
        (status = 400, description = "Invalid email, password or name, or unknown school/class"),
        (status = 401, description = "Invalid admin secret"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Rate limited; see Retry-After")
    ),
    tag = "Admin"
)]
pub async fn create_user(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    limiter: web::Data<FixedWindowLimiter>,
    registry: web::Data<EmailRegistry>,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, AppError> {
    admin_guard(&req, &config, &limiter, config.rate_create_user, "create-user")?;
    payload.validate()?;

    let email = normalize(&payload.email);
    if !registry.is_available(&email, pool.get_ref()).await? {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let account = NewAccount {
        password_hash: hash_blocking(payload.password.clone()).await?,
        email,
        full_name: payload.full_name.trim(),
        role: payload.role,
        school_id: &payload.school_id,
        nis: payload.nis.as_deref(),
        nip: payload.nip.as_deref(),
        class_id: payload.class_id.as_deref(),
        phone: payload.phone.as_deref(),
    };

    match insert_account(pool.get_ref(), &account).await {
        Ok(id) => {
            registry.insert(&account.email);
            info!(user_id = %id, role = %account.role, "User created");
            Ok(HttpResponse::Created().json(json!({
                "message": "User created successfully",
                "id": id
            })))
        }
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::Conflict("Email already registered".into()))
        }
        Err(e) if is_foreign_key_violation(&e) => {
            Err(AppError::BadRequest("Unknown school_id or class_id".into()))
        }
        Err(e) => {
            error!(error = %e, "Failed to create user");
            Err(e.into())
        }
    }
}

/// Delete a user account and its profile
#[utoipa::path(
    delete,
    path = "/admin/users/{user_id}",
    params(
        ("user_id", Path, description = "User ID"),
        ("x-admin-secret" = String, Header, description = "Admin shared secret")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 401, description = "Invalid admin secret"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limited; see Retry-After")
    ),
    tag = "Admin"
)]
pub async fn delete_user(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    limiter: web::Data<FixedWindowLimiter>,
    registry: web::Data<EmailRegistry>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    admin_guard(&req, &config, &limiter, config.rate_delete_user, "delete-user")?;
    let user_id = path.into_inner();

    let credential = fetch_credential(pool.get_ref(), &user_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query(r#"DELETE FROM profiles WHERE id = ?"#)
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(r#"DELETE FROM users WHERE id = ?"#)
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await.map_err(|e| {
        error!(error = %e, user_id, "Failed to delete user");
        AppError::from(e)
    })?;

    registry.remove(&credential.email);
    info!(user_id, "User deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "User deleted successfully" })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    #[schema(example = "baru12345")]
    pub password: String,
}

/// Set a new password for a user
#[utoipa::path(
    post,
    path = "/admin/users/{user_id}/reset-password",
    params(
        ("user_id", Path, description = "User ID"),
        ("x-admin-secret" = String, Header, description = "Admin shared secret")
    ),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Password too short"),
        (status = 401, description = "Invalid admin secret"),
        (status = 404, description = "User not found"),
        (status = 429, description = "Rate limited; see Retry-After")
    ),
    tag = "Admin"
)]
pub async fn reset_password(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    limiter: web::Data<FixedWindowLimiter>,
    path: web::Path<String>,
    payload: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, AppError> {
    admin_guard(&req, &config, &limiter, config.rate_reset_password, "reset-password")?;
    let user_id = path.into_inner();

    if !is_acceptable_password(&payload.password) {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let credential = fetch_credential(pool.get_ref(), &user_id).await?;
    let password_hash = hash_blocking(payload.into_inner().password).await?;

    sqlx::query(r#"UPDATE users SET password_hash = ? WHERE id = ?"#)
        .bind(&password_hash)
        .bind(&credential.id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, user_id, "Failed to reset password");
            AppError::from(e)
        })?;

    info!(user_id, "Password reset");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password reset successfully" })))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImportStudent {
    #[schema(example = "Budi Santoso")]
    pub full_name: String,
    #[schema(example = "0051234567")]
    pub nis: String,
    #[schema(example = "budi@sman1.sch.id")]
    pub email: String,
    /// Defaults to the NIS
    pub password: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkImportRequest {
    pub school_id: String,
    pub class_id: Option<String>,
    pub students: Vec<ImportStudent>,
}

#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct ImportRowResult {
    /// Zero-based position in the request
    pub row: usize,
    pub email: String,
    /// created | skipped
    pub status: String,
    pub reason: Option<String>,
    pub id: Option<String>,
}

impl ImportRowResult {
    fn skipped(row: usize, email: String, reason: impl Into<String>) -> Self {
        Self {
            row,
            email,
            status: "skipped".to_string(),
            reason: Some(reason.into()),
            id: None,
        }
    }

    fn created(row: usize, email: String, id: String) -> Self {
        Self {
            row,
            email,
            status: "created".to_string(),
            reason: None,
            id: Some(id),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkImportResponse {
    pub created: usize,
    pub skipped: usize,
    pub results: Vec<ImportRowResult>,
}

/// Rows that can be attempted, and the ones rejected before touching the database.
fn screen_rows(students: &[ImportStudent]) -> (Vec<(usize, String)>, Vec<ImportRowResult>) {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut rejected = Vec::new();

    for (row, student) in students.iter().enumerate() {
        let email = normalize(&student.email);

        if student.full_name.trim().is_empty() || student.nis.trim().is_empty() {
            rejected.push(ImportRowResult::skipped(row, email, "full_name and nis are required"));
        } else if !is_plausible_email(&email) {
            rejected.push(ImportRowResult::skipped(row, email, "invalid email"));
        } else if student
            .password
            .as_deref()
            .is_some_and(|password| !is_acceptable_password(password))
        {
            rejected.push(ImportRowResult::skipped(
                row,
                email,
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        } else if !seen.insert(email.clone()) {
            rejected.push(ImportRowResult::skipped(row, email, "duplicate email in batch"));
        } else {
            candidates.push((row, email));
        }
    }

    (candidates, rejected)
}

/// Creates one screened row. Failures become a skipped result so earlier rows stay reported.
async fn import_row(
    pool: &MySqlPool,
    registry: &EmailRegistry,
    school_id: &str,
    class_id: Option<&str>,
    row: usize,
    student: &ImportStudent,
    email: String,
) -> ImportRowResult {
    match registry.is_available(&email, pool).await {
        Ok(true) => {}
        Ok(false) => return ImportRowResult::skipped(row, email, "email already registered"),
        Err(e) => {
            error!(error = %e, row, "Bulk import availability check failed");
            return ImportRowResult::skipped(row, email, "database error");
        }
    }

    let password = student
        .password
        .clone()
        .unwrap_or_else(|| student.nis.trim().to_string());
    let password_hash = match hash_blocking(password).await {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, row, "Bulk import hashing failed");
            return ImportRowResult::skipped(row, email, "password hashing failed");
        }
    };

    let account = NewAccount {
        password_hash,
        email,
        full_name: student.full_name.trim(),
        role: Role::Student,
        school_id,
        nis: Some(student.nis.trim()),
        nip: None,
        class_id,
        phone: student.phone.as_deref(),
    };

    match insert_account(pool, &account).await {
        Ok(id) => {
            registry.insert(&account.email);
            ImportRowResult::created(row, account.email, id)
        }
        Err(e) if is_unique_violation(&e) => {
            ImportRowResult::skipped(row, account.email, "email already registered")
        }
        Err(e) if is_foreign_key_violation(&e) => {
            ImportRowResult::skipped(row, account.email, "unknown school_id or class_id")
        }
        Err(e) => {
            error!(error = %e, row, "Bulk import row failed");
            ImportRowResult::skipped(row, account.email, "database error")
        }
    }
}

/// Import a batch of students
#[utoipa::path(
    post,
    path = "/admin/students/import",
    params(("x-admin-secret" = String, Header, description = "Admin shared secret")),
    request_body = BulkImportRequest,
    responses(
        (status = 200, body = BulkImportResponse),
        (status = 400, description = "Empty batch or more than 500 rows"),
        (status = 401, description = "Invalid admin secret"),
        (status = 429, description = "Rate limited; see Retry-After")
    ),
    tag = "Admin"
)]
pub async fn bulk_import(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    limiter: web::Data<FixedWindowLimiter>,
    registry: web::Data<EmailRegistry>,
    payload: web::Json<BulkImportRequest>,
) -> Result<HttpResponse, AppError> {
    admin_guard(&req, &config, &limiter, config.rate_bulk_import, "bulk-import")?;

    if payload.students.is_empty() || payload.students.len() > MAX_IMPORT_ROWS {
        return Err(AppError::BadRequest(format!(
            "students must contain 1 to {MAX_IMPORT_ROWS} rows"
        )));
    }

    let (candidates, mut results) = screen_rows(&payload.students);

    for (row, email) in candidates {
        let result = import_row(
            pool.get_ref(),
            &registry,
            &payload.school_id,
            payload.class_id.as_deref(),
            row,
            &payload.students[row],
            email,
        )
        .await;
        results.push(result);
    }

    results.sort_by_key(|r| r.row);
    let created = results.iter().filter(|r| r.status == "created").count();
    let skipped = results.len() - created;
    info!(created, skipped, school_id = %payload.school_id, "Bulk import finished");

    Ok(HttpResponse::Ok().json(BulkImportResponse {
        created,
        skipped,
        results,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendEmailRequest {
    pub recipients: Vec<String>,
    #[schema(example = "Undangan rapat orang tua")]
    pub subject: String,
    pub body: String,
}

impl SendEmailRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.recipients.is_empty() || self.recipients.len() > MAX_EMAIL_RECIPIENTS {
            return Err(AppError::BadRequest(format!(
                "recipients must contain 1 to {MAX_EMAIL_RECIPIENTS} addresses"
            )));
        }
        if let Some(bad) = self.recipients.iter().find(|r| !is_plausible_email(r.trim())) {
            return Err(AppError::BadRequest(format!("Invalid recipient `{bad}`")));
        }
        if self.subject.trim().is_empty() || self.body.trim().is_empty() {
            return Err(AppError::BadRequest("subject and body are required".into()));
        }
        Ok(())
    }
}

/// Queue an email for delivery
#[utoipa::path(
    post,
    path = "/admin/emails",
    params(("x-admin-secret" = String, Header, description = "Admin shared secret")),
    request_body = SendEmailRequest,
    responses(
        (status = 202, description = "Queued", body = Object, example = json!({
            "message": "Email queued",
            "queued": 3
        })),
        (status = 400, description = "Bad recipients, subject or body"),
        (status = 401, description = "Invalid admin secret"),
        (status = 429, description = "Rate limited; see Retry-After")
    ),
    tag = "Admin"
)]
pub async fn send_email(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    limiter: web::Data<FixedWindowLimiter>,
    payload: web::Json<SendEmailRequest>,
) -> Result<HttpResponse, AppError> {
    admin_guard(&req, &config, &limiter, config.rate_send_email, "send-email")?;
    payload.validate()?;

    let mut tx = pool.begin().await?;
    for recipient in &payload.recipients {
        sqlx::query(
            r#"
            INSERT INTO email_outbox (id, recipient, subject, body, status)
            VALUES (?, ?, ?, ?, 'queued')
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(normalize(recipient))
        .bind(payload.subject.trim())
        .bind(&payload.body)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await.map_err(|e| {
        error!(error = %e, "Failed to queue email");
        AppError::from(e)
    })?;

    info!(recipients = payload.recipients.len(), "Email queued");
    Ok(HttpResponse::Accepted().json(json!({
        "message": "Email queued",
        "queued": payload.recipients.len()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn student(name: &str, nis: &str, email: &str) -> ImportStudent {
        ImportStudent {
            full_name: name.into(),
            nis: nis.into(),
            email: email.into(),
            password: None,
            phone: None,
        }
    }

    #[test]
    fn guard_checks_secret_before_budget() {
        let config = Config::for_tests();
        let limiter = FixedWindowLimiter::new();
        let policy = RateLimitPolicy::new(1, 60_000);

        let missing = TestRequest::default().to_http_request();
        assert!(matches!(
            admin_guard(&missing, &config, &limiter, policy, "create-user"),
            Err(AppError::Unauthorized(_))
        ));

        let wrong = TestRequest::default()
            .insert_header((ADMIN_SECRET_HEADER, "guess"))
            .to_http_request();
        assert!(matches!(
            admin_guard(&wrong, &config, &limiter, policy, "create-user"),
            Err(AppError::Unauthorized(_))
        ));
        // rejected calls do not spend the budget
        assert_eq!(limiter.tracked_keys(), 0);

        let ok = TestRequest::default()
            .insert_header((ADMIN_SECRET_HEADER, "admin-secret"))
            .insert_header(("x-forwarded-for", "10.1.1.1"))
            .to_http_request();
        assert!(admin_guard(&ok, &config, &limiter, policy, "create-user").is_ok());
        assert!(matches!(
            admin_guard(&ok, &config, &limiter, policy, "create-user"),
            Err(AppError::RateLimited { retry_after_secs: 60 })
        ));

        // separate budget per endpoint
        assert!(admin_guard(&ok, &config, &limiter, policy, "send-email").is_ok());
    }

    #[test]
    fn email_plausibility() {
        assert!(is_plausible_email("guru@sman1.sch.id"));
        assert!(!is_plausible_email("guru"));
        assert!(!is_plausible_email("@sman1.sch.id"));
        assert!(!is_plausible_email("guru@localhost"));
        assert!(!is_plausible_email("a@b@c.id"));
        assert!(!is_plausible_email("gu ru@sman1.sch.id"));
    }

    #[test]
    fn screens_invalid_and_duplicate_rows() {
        let rows = vec![
            student("Budi", "001", "budi@sman1.sch.id"),
            student("", "002", "ani@sman1.sch.id"),
            student("Budi Dua", "003", "BUDI@sman1.sch.id"),
            student("Citra", "004", "citra"),
            student("Dewi", "005", "dewi@sman1.sch.id"),
        ];

        let (candidates, rejected) = screen_rows(&rows);

        assert_eq!(
            candidates,
            vec![
                (0, "budi@sman1.sch.id".to_string()),
                (4, "dewi@sman1.sch.id".to_string())
            ]
        );
        let reasons: Vec<_> = rejected
            .iter()
            .map(|r| (r.row, r.reason.as_deref().unwrap_or_default()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (1, "full_name and nis are required"),
                (2, "duplicate email in batch"),
                (3, "invalid email"),
            ]
        );
    }

    #[test]
    fn screens_short_explicit_passwords() {
        let mut weak = student("Eka", "006", "eka@sman1.sch.id");
        weak.password = Some("123".into());
        let mut strong = student("Fajar", "007", "fajar@sman1.sch.id");
        strong.password = Some("cukupPanjang".into());

        let (candidates, rejected) = screen_rows(&[weak, strong]);

        assert_eq!(candidates, vec![(1, "fajar@sman1.sch.id".to_string())]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].row, 0);
        assert!(rejected[0].reason.as_deref().unwrap_or_default().starts_with("password"));
    }

    fn unreachable_pool() -> MySqlPool {
        sqlx::mysql::MySqlPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("mysql://root@127.0.0.1:1/siakad")
            .unwrap()
    }

    #[actix_web::test]
    async fn import_row_reports_lookup_failure_as_skipped() {
        let pool = unreachable_pool();
        let registry = EmailRegistry::new();
        // a filter hit forces the database lookup
        registry.insert("gilang@sman1.sch.id");
        let row = student("Gilang", "008", "gilang@sman1.sch.id");

        let result = import_row(
            &pool,
            &registry,
            "s-1",
            None,
            3,
            &row,
            "gilang@sman1.sch.id".into(),
        )
        .await;

        assert_eq!(result.row, 3);
        assert_eq!(result.status, "skipped");
        assert_eq!(result.reason.as_deref(), Some("database error"));
    }

    #[actix_web::test]
    async fn import_row_reports_insert_failure_as_skipped() {
        let pool = unreachable_pool();
        let registry = EmailRegistry::new();
        let row = student("Hana", "0123456789", "hana@sman1.sch.id");

        let result = import_row(
            &pool,
            &registry,
            "s-1",
            None,
            0,
            &row,
            "hana@sman1.sch.id".into(),
        )
        .await;

        assert_eq!(result.status, "skipped");
        assert_eq!(result.reason.as_deref(), Some("database error"));
        assert!(!registry.might_exist("hana@sman1.sch.id"));
    }

    #[test]
    fn email_request_limits() {
        let request = |n: usize| SendEmailRequest {
            recipients: (0..n).map(|i| format!("ortu{i}@mail.id")).collect(),
            subject: "Rapat".into(),
            body: "Hadir pukul 09.00".into(),
        };

        assert!(request(1).validate().is_ok());
        assert!(request(100).validate().is_ok());
        assert!(request(0).validate().is_err());
        assert!(request(101).validate().is_err());
    }

    #[test]
    fn create_user_requires_long_password() {
        let body: CreateUserRequest = serde_json::from_value(json!({
            "email": "siti@sman1.sch.id",
            "password": "pendek",
            "full_name": "Siti",
            "role": "teacher",
            "school_id": "s-1"
        }))
        .unwrap();
        assert!(matches!(body.validate(), Err(AppError::BadRequest(_))));
    }
}
