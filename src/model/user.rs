/// Credential row managed by the admin endpoints.
#[derive(Debug, sqlx::FromRow)]
pub struct UserCredential {
    pub id: String,
    pub email: String,
    pub password_hash: String,
}
