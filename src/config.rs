use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use tracing::info;

use crate::utils::rate_limiter::RateLimitPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    /// Shared secret expected in `x-admin-secret` on admin endpoints
    pub admin_secret: String,
    pub api_prefix: String,

    // Governor limiter on the authenticated API scope
    pub rate_protected_per_min: u32,

    // Fixed-window policies for admin endpoints
    pub rate_create_user: RateLimitPolicy,
    pub rate_delete_user: RateLimitPolicy,
    pub rate_reset_password: RateLimitPolicy,
    pub rate_bulk_import: RateLimitPolicy,
    pub rate_send_email: RateLimitPolicy,

    pub schedule_buffer_minutes: u32,
    pub geofence_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            admin_secret: required("ADMIN_SECRET")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", "1000")?,

            rate_create_user: parse_or(&lookup, "RATE_CREATE_USER", "20/3600000")?,
            rate_delete_user: parse_or(&lookup, "RATE_DELETE_USER", "20/3600000")?,
            rate_reset_password: parse_or(&lookup, "RATE_RESET_PASSWORD", "5/900000")?,
            rate_bulk_import: parse_or(&lookup, "RATE_BULK_IMPORT", "5/3600000")?,
            rate_send_email: parse_or(&lookup, "RATE_SEND_EMAIL", "50/3600000")?,

            schedule_buffer_minutes: parse_or(&lookup, "SCHEDULE_BUFFER_MINUTES", "15")?,
            geofence_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "GEOFENCE_CACHE_TTL_SECS",
                "300",
            )?),
        })
    }
}

#[cfg(test)]
impl Config {
    /// Config for in-process tests; the database URL is only used by lazy pools.
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| {
            let value = match key {
                "SERVER_ADDR" => Some("127.0.0.1:0"),
                "DATABASE_URL" => Some("mysql://root@localhost/siakad"),
                "JWT_SECRET" => Some(crate::auth::jwt::testing::SECRET),
                "ADMIN_SECRET" => Some("admin-secret"),
                _ => None,
            };
            value.map(str::to_string)
        })
        .expect("test config")
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://root@localhost/siakad"),
        ("JWT_SECRET", "secret"),
        ("ADMIN_SECRET", "admin"),
    ];

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.rate_reset_password.limit, 5);
        assert_eq!(config.rate_reset_password.window, Duration::from_millis(900_000));
        assert_eq!(config.rate_send_email.limit, 50);
        assert_eq!(config.schedule_buffer_minutes, 15);
        assert_eq!(config.geofence_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn overrides_policy() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_SEND_EMAIL", "10/60000"));

        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.rate_send_email.limit, 10);
        assert_eq!(config.rate_send_email.window, Duration::from_secs(60));
    }

    #[test]
    fn missing_required_value_fails() {
        let err = Config::from_lookup(lookup(&REQUIRED[..3])).unwrap_err();
        assert!(err.to_string().contains("ADMIN_SECRET"));
    }

    #[test]
    fn malformed_value_fails() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_BULK_IMPORT", "lots"));

        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
