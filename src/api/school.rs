use crate::{
    auth::auth::AuthUser,
    error::AppError,
    geo::Coordinate,
    model::school::School,
    utils::geofence_cache::GeofenceCache,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateGeofence {
    #[schema(example = -6.8915)]
    pub latitude: f64,
    #[schema(example = 107.6107)]
    pub longitude: f64,
    #[schema(example = 150.0)]
    pub radius_m: f64,
    pub enabled: bool,
}

impl UpdateGeofence {
    fn validate(&self) -> Result<(), AppError> {
        if !Coordinate::new(self.latitude, self.longitude).is_in_range() {
            return Err(AppError::BadRequest(
                "latitude must be within -90..90 and longitude within -180..180".into(),
            ));
        }
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            return Err(AppError::BadRequest("radius_m must be positive".into()));
        }
        Ok(())
    }
}

/// Get School by ID
#[utoipa::path(
    get,
    path = "/api/schools/{school_id}",
    params(("school_id", Path, description = "School ID")),
    responses(
        (status = 200, body = School),
        (status = 404, description = "School not found")
    ),
    security(("bearer_auth" = [])),
    tag = "School"
)]
pub async fn get_school(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schools: web::Data<GeofenceCache>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let school_id = path.into_inner();

    match schools.school(pool.get_ref(), &school_id).await? {
        Some(school) => Ok(HttpResponse::Ok().json(school)),
        None => Err(AppError::NotFound("School not found".into())),
    }
}

/// Configure the attendance geofence of a school
#[utoipa::path(
    put,
    path = "/api/schools/{school_id}/geofence",
    params(("school_id", Path, description = "School ID")),
    request_body = UpdateGeofence,
    responses(
        (status = 200, description = "Geofence updated", body = Object, example = json!({
            "message": "Geofence updated successfully"
        })),
        (status = 400, description = "Coordinate or radius out of range"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "School not found")
    ),
    security(("bearer_auth" = [])),
    tag = "School"
)]
pub async fn update_geofence(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schools: web::Data<GeofenceCache>,
    path: web::Path<String>,
    body: web::Json<UpdateGeofence>,
) -> Result<HttpResponse, AppError> {
    auth.require_admin()?;
    let school_id = path.into_inner();

    if auth.school_id()? != school_id {
        return Err(AppError::Forbidden("Cannot edit another school".into()));
    }
    body.validate()?;

    let result = sqlx::query(
        r#"
        UPDATE schools
        SET geofence_latitude = ?, geofence_longitude = ?, geofence_radius_m = ?, geofence_enabled = ?
        WHERE id = ?
        "#,
    )
    .bind(body.latitude)
    .bind(body.longitude)
    .bind(body.radius_m)
    .bind(body.enabled)
    .bind(&school_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, school_id, "Failed to update geofence");
        AppError::from(e)
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("School not found".into()));
    }

    schools.invalidate(&school_id).await;
    info!(school_id, radius_m = body.radius_m, enabled = body.enabled, "Geofence updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Geofence updated successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geofence_update_validation() {
        let ok = UpdateGeofence {
            latitude: -6.9,
            longitude: 107.6,
            radius_m: 150.0,
            enabled: true,
        };
        assert!(ok.validate().is_ok());

        let bad_lat = UpdateGeofence { latitude: 91.0, ..ok };
        assert!(bad_lat.validate().is_err());

        let bad_radius = UpdateGeofence {
            radius_m: 0.0,
            latitude: -6.9,
            ..bad_lat
        };
        assert!(bad_radius.validate().is_err());
    }
}
