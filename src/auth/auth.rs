use crate::{auth::jwt::{Claims, verify_token}, config::Config, error::AppError, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Profile id (the identity provider's user id)
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub school_id: Option<String>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role = claims
            .role
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
            role,
            school_id: claims.school_id,
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // already verified by auth_middleware
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = bearer_token(req)?;
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Config missing")))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid token".into()))?;

    AuthUser::try_from(claims)
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req).map_err(Into::into))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin only".into()))
        }
    }

    pub fn require_teacher_or_admin(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::Teacher) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Teacher/Admin only".into()))
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff_member() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Staff only".into()))
        }
    }

    pub fn school_id(&self) -> Result<&str, AppError> {
        self.school_id
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("No school assigned".into()))
    }

    /// Own records are always visible; staff see everyone's.
    pub fn can_view_profile(&self, profile_id: &str) -> bool {
        self.user_id == profile_id || self.role.is_staff_member()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::testing::token_for;
    use actix_web::{http::StatusCode, test::TestRequest};

    fn config() -> Config {
        Config::for_tests()
    }

    #[actix_web::test]
    async fn extracts_user_from_bearer_token() {
        let token = token_for("t-1", "teacher", Some("s-1"));
        let (req, mut payload) = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_parts();

        let user = AuthUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(user.user_id, "t-1");
        assert_eq!(user.role, Role::Teacher);
        assert_eq!(user.school_id().unwrap(), "s-1");
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let (req, mut payload) = TestRequest::default()
            .app_data(Data::new(config()))
            .to_http_parts();

        let err = AuthUser::from_request(&req, &mut payload).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn unknown_role_is_unauthorized() {
        let token = token_for("x", "principal", None);
        let (req, mut payload) = TestRequest::default()
            .app_data(Data::new(config()))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_http_parts();

        assert!(AuthUser::from_request(&req, &mut payload).await.is_err());
    }

    #[test]
    fn role_guards() {
        let student = AuthUser {
            user_id: "st".into(),
            email: None,
            role: Role::Student,
            school_id: None,
        };

        assert!(student.require_staff().is_err());
        assert!(student.require_admin().is_err());
        assert!(student.school_id().is_err());
        assert!(student.can_view_profile("st"));
        assert!(!student.can_view_profile("other"));
    }
}
