use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::AppError;

/// Row offset for a 1-based page. Saturates instead of overflowing on huge pages.
pub fn page_offset(page: u32, per_page: u32) -> i64 {
    i64::from(page.max(1) - 1).saturating_mul(i64::from(per_page))
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> Result<SqlValue, AppError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
                SqlValue::Time(t)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::BadRequest("Unsupported number".into()));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(AppError::BadRequest("Unsupported JSON value type".into())),
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only keys listed in `allowed_columns` may appear in the payload.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed_columns: &[&str],
    id_column: &str,
    id_value: &str,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::BadRequest("Payload must be a JSON object".into()))?;

    if obj.is_empty() {
        return Err(AppError::BadRequest("No fields provided for update".into()));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed_columns.contains(&k.as_str())) {
        return Err(AppError::BadRequest(format!("Field `{unknown}` cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);
    for value in obj.values() {
        values.push(to_sql_value(value)?);
    }

    // WHERE id = ?
    values.push(SqlValue::String(id_value.to_string()));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PROFILE_COLUMNS: &[&str] = &["full_name", "phone", "class_id"];

    #[test]
    #[allow(arithmetic_overflow)]
    fn page_offset_handles_extreme_pages() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(u32::MAX, 100), (u32::MAX as i64 - 1) * 100);
        assert_eq!(page_offset(u32::MAX, u32::MAX), (u32::MAX as i64 - 1) * u32::MAX as i64);
    }

    #[test]
    fn builds_parameterized_update() {
        let update = build_update_sql(
            "profiles",
            &json!({"full_name": "Budi Santoso"}),
            PROFILE_COLUMNS,
            "id",
            "p-1",
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE profiles SET full_name = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Budi Santoso".into()),
                SqlValue::String("p-1".into()),
            ]
        );
    }

    #[test]
    fn rejects_columns_outside_whitelist() {
        let err = build_update_sql(
            "profiles",
            &json!({"role": "admin"}),
            PROFILE_COLUMNS,
            "id",
            "p-1",
        )
        .unwrap_err();

        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("profiles", &json!({}), PROFILE_COLUMNS, "id", "p").is_err());
        assert!(build_update_sql("profiles", &json!([1]), PROFILE_COLUMNS, "id", "p").is_err());
    }

    #[test]
    fn detects_dates_and_times() {
        assert_eq!(
            to_sql_value(&json!("2026-02-01")).unwrap(),
            SqlValue::Date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap())
        );
        assert_eq!(
            to_sql_value(&json!("07:30:00")).unwrap(),
            SqlValue::Time(NaiveTime::from_hms_opt(7, 30, 0).unwrap())
        );
        assert_eq!(to_sql_value(&json!(88.5)).unwrap(), SqlValue::F64(88.5));
        assert_eq!(to_sql_value(&json!(null)).unwrap(), SqlValue::Null);
        assert!(to_sql_value(&json!({"a": 1})).is_err());
    }
}
