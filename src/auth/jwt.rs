use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims carried by tokens from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Profile id
    pub sub: String,
    pub email: Option<String>,
    pub role: String,
    pub school_id: Option<String>,
    pub exp: usize,
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
pub mod testing {
    use super::Claims;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub const SECRET: &str = "test-secret";

    /// Signs a token the way the identity provider would.
    pub fn token_for(sub: &str, role: &str, school_id: Option<&str>) -> String {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize
            + 900;

        let claims = Claims {
            sub: sub.to_string(),
            email: Some(format!("{sub}@sekolah.id")),
            role: role.to_string(),
            school_id: school_id.map(str::to_string),
            exp,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{SECRET, token_for};
    use super::*;

    #[test]
    fn verifies_provider_token() {
        let token = token_for("p-1", "teacher", Some("s-1"));
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, "p-1");
        assert_eq!(claims.role, "teacher");
        assert_eq!(claims.school_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = token_for("p-1", "teacher", None);
        assert!(verify_token(&token, "other").is_err());
    }
}
