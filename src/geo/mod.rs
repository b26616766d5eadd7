pub mod schedule;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius in meters, spherical model.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// WGS84 point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    #[schema(example = -6.200000)]
    pub latitude: f64,
    #[schema(example = 106.816666)]
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance functions never call this; only geofence configuration does.
    pub fn is_in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeofenceTarget {
    pub center: Coordinate,
    #[schema(example = 100.0)]
    pub radius_m: f64,
}

/// Outcome of a geofence check.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LocationCheck {
    pub is_valid: bool,
    /// Rounded meters, absent when a coordinate was missing
    pub distance: Option<f64>,
    pub error: Option<String>,
}

/// Great-circle distance in meters (Haversine).
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // clamp keeps asin in domain for garbage input
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Checks `user` against `target`. The boundary is inclusive and uses the
/// unrounded distance; the reported distance is rounded to whole meters.
pub fn validate_location(
    user: Option<Coordinate>,
    target: Option<&GeofenceTarget>,
) -> LocationCheck {
    let (user, target) = match (user, target) {
        (Some(u), Some(t)) => (u, t),
        _ => {
            return LocationCheck {
                is_valid: false,
                distance: None,
                error: Some("Invalid coordinates".to_string()),
            };
        }
    };

    let distance = distance_meters(user, target.center);

    LocationCheck {
        is_valid: distance <= target.radius_m,
        distance: Some(distance.round()),
        error: None,
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round())
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let jakarta = Coordinate::new(-6.2, 106.816666);
        let bandung = Coordinate::new(-6.917464, 107.619123);

        assert_eq!(distance_meters(jakarta, jakarta), 0.0);
        assert!(close(
            distance_meters(jakarta, bandung),
            distance_meters(bandung, jakarta),
            1e-6
        ));
    }

    #[test]
    fn thousandth_of_a_degree_latitude_is_about_111_meters() {
        let d = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(0.001, 0.0));
        assert!(close(d, 111.19, 111.19 * 0.01), "got {d}");
    }

    #[test]
    fn long_distance_matches_known_value() {
        // Jakarta to Surabaya, roughly 663 km
        let d = distance_meters(
            Coordinate::new(-6.2088, 106.8456),
            Coordinate::new(-7.2575, 112.7521),
        );
        assert!(close(d / 1000.0, 663.0, 10.0), "got {d}");
    }

    #[test]
    fn out_of_range_input_does_not_panic() {
        let d = distance_meters(Coordinate::new(500.0, -900.0), Coordinate::new(0.0, 0.0));
        assert!(d.is_finite());
        assert!(!Coordinate::new(500.0, -900.0).is_in_range());
        assert!(Coordinate::new(-90.0, 180.0).is_in_range());
    }

    #[test]
    fn boundary_is_inclusive() {
        let center = Coordinate::new(0.0, 0.0);
        let user = Coordinate::new(0.0005, 0.0);
        let target = GeofenceTarget {
            center,
            radius_m: distance_meters(user, center),
        };

        let check = validate_location(Some(user), Some(&target));
        assert!(check.is_valid);
        assert!(check.error.is_none());
    }

    #[test]
    fn missing_coordinate_is_an_error_result() {
        let target = GeofenceTarget {
            center: Coordinate::new(0.0, 0.0),
            radius_m: 100.0,
        };

        let no_user = validate_location(None, Some(&target));
        assert!(!no_user.is_valid);
        assert!(no_user.distance.is_none());
        assert!(no_user.error.is_some());

        let no_target = validate_location(Some(Coordinate::new(0.0, 0.0)), None);
        assert!(!no_target.is_valid);
        assert!(no_target.error.is_some());
    }

    #[test]
    fn just_outside_radius_is_rejected() {
        let target = GeofenceTarget {
            center: Coordinate::new(0.0, 0.0),
            radius_m: 100.0,
        };

        let check = validate_location(Some(Coordinate::new(0.0, 0.0009)), Some(&target));
        assert!(!check.is_valid);
        assert_eq!(check.distance, Some(100.0));
    }

    #[test]
    fn formats_meters_and_kilometers() {
        assert_eq!(format_distance(999.0), "999 m");
        assert_eq!(format_distance(1000.0), "1.0 km");
        assert_eq!(format_distance(12.4), "12 m");
        assert_eq!(format_distance(2500.0), "2.5 km");
    }
}
