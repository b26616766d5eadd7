use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::{Coordinate, GeofenceTarget};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": "5d0f5a8e-3c55-4a4b-9a57-0f2f6f0f6a11",
        "name": "SMA Negeri 1 Bandung",
        "address": "Jl. Ir. H. Juanda No. 93",
        "geofence_latitude": -6.8915,
        "geofence_longitude": 107.6107,
        "geofence_radius_m": 150.0,
        "geofence_enabled": true
    })
)]
pub struct School {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub geofence_latitude: Option<f64>,
    pub geofence_longitude: Option<f64>,
    pub geofence_radius_m: Option<f64>,
    pub geofence_enabled: bool,
}

impl School {
    /// The target self check-in is validated against, if the school enforces one.
    pub fn active_geofence(&self) -> Option<GeofenceTarget> {
        if !self.geofence_enabled {
            return None;
        }

        match (
            self.geofence_latitude,
            self.geofence_longitude,
            self.geofence_radius_m,
        ) {
            (Some(latitude), Some(longitude), Some(radius_m)) => Some(GeofenceTarget {
                center: Coordinate::new(latitude, longitude),
                radius_m,
            }),
            _ => None,
        }
    }
}
