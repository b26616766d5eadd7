use actix_web::http::StatusCode;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

use crate::geo::{Coordinate, GeofenceTarget, format_distance, validate_location};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Sick,
    Permission,
    Absent,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: String,
    pub profile_id: String,
    pub school_id: String,
    #[schema(example = "2026-01-12", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "07:12:00", value_type = Option<String>)]
    pub check_in_time: Option<NaiveTime>,
    #[schema(example = "15:02:00", value_type = Option<String>)]
    pub check_out_time: Option<NaiveTime>,
    #[schema(example = "present")]
    pub status: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_label: Option<String>,
    pub distance_m: Option<f64>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub notes: Option<String>,
}

impl AttendanceRecord {
    pub fn status(&self) -> Option<AttendanceStatus> {
        self.status.parse().ok()
    }
}

/// Why the device could not produce a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationFailure {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

impl GeolocationFailure {
    pub fn message(&self) -> &'static str {
        match self {
            GeolocationFailure::PermissionDenied => {
                "Izin lokasi ditolak. Aktifkan akses lokasi untuk melakukan absensi."
            }
            GeolocationFailure::PositionUnavailable => {
                "Lokasi tidak tersedia. Pastikan GPS aktif lalu coba lagi."
            }
            GeolocationFailure::Timeout => "Waktu habis saat mengambil lokasi. Silakan coba lagi.",
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct DeviceLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported accuracy in meters
    pub accuracy: Option<f64>,
}

/// What the client reports about the device position: a fix, or why there is none.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LocationInput {
    pub location: Option<DeviceLocation>,
    pub location_error: Option<GeolocationFailure>,
}

impl LocationInput {
    pub fn resolve(&self) -> Result<Coordinate, AttendanceError> {
        if let Some(failure) = self.location_error {
            return Err(AttendanceError::Geolocation(failure));
        }

        self.location
            .map(|l| Coordinate::new(l.latitude, l.longitude))
            .ok_or(AttendanceError::LocationRequired)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttendanceError {
    #[error("{}", .0.message())]
    Geolocation(GeolocationFailure),

    #[error("Lokasi perangkat diperlukan untuk absensi.")]
    LocationRequired,

    #[error(
        "Anda berada di luar area sekolah. Jarak Anda {}, radius yang diizinkan {}.",
        meters(.distance_m),
        meters(.radius_m)
    )]
    OutsideGeofence { distance_m: f64, radius_m: f64 },

    #[error("Anda sudah melakukan check-in hari ini.")]
    AlreadyCheckedIn,

    #[error("Anda sudah melakukan check-out hari ini.")]
    AlreadyCheckedOut,

    #[error("Belum ada check-in untuk hari ini.")]
    NotCheckedIn,

    #[error("Kehadiran hari ini sudah tercatat sebagai {0}.")]
    AlreadyRecorded(AttendanceStatus),

    #[error("Status {0} tidak dapat diajukan secara mandiri.")]
    InvalidManualStatus(AttendanceStatus),
}

fn meters(value: &f64) -> String {
    format_distance(*value)
}

impl AttendanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Geolocation(_)
            | AttendanceError::LocationRequired
            | AttendanceError::InvalidManualStatus(_) => StatusCode::BAD_REQUEST,
            AttendanceError::OutsideGeofence { .. } => StatusCode::FORBIDDEN,
            AttendanceError::AlreadyCheckedIn
            | AttendanceError::AlreadyCheckedOut
            | AttendanceError::NotCheckedIn
            | AttendanceError::AlreadyRecorded(_) => StatusCode::CONFLICT,
        }
    }
}

/// Lifecycle of one person's attendance for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceState {
    NoRecord,
    CheckedIn,
    CheckedOut,
    /// Recorded without a check-in (sick, permission, or marked absent)
    Excused(AttendanceStatus),
}

impl AttendanceState {
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceState::NoRecord => "no_record",
            AttendanceState::CheckedIn => "checked_in",
            AttendanceState::CheckedOut => "checked_out",
            AttendanceState::Excused(_) => "excused",
        }
    }

    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => AttendanceState::NoRecord,
            Some(r) if r.check_out_time.is_some() => AttendanceState::CheckedOut,
            Some(r) if r.check_in_time.is_some() => AttendanceState::CheckedIn,
            Some(r) => AttendanceState::Excused(r.status().unwrap_or(AttendanceStatus::Absent)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckInPlan {
    pub coordinate: Coordinate,
    /// Rounded distance to the school, only when a geofence was enforced
    pub distance_m: Option<f64>,
}

/// NoRecord -> CheckedIn. `geofence` is `Some` only when the school enforces one.
pub fn plan_check_in(
    state: AttendanceState,
    location: &LocationInput,
    geofence: Option<&GeofenceTarget>,
) -> Result<CheckInPlan, AttendanceError> {
    match state {
        AttendanceState::NoRecord => {}
        AttendanceState::CheckedIn => return Err(AttendanceError::AlreadyCheckedIn),
        AttendanceState::CheckedOut => return Err(AttendanceError::AlreadyCheckedOut),
        AttendanceState::Excused(status) => return Err(AttendanceError::AlreadyRecorded(status)),
    }

    let coordinate = location.resolve()?;

    let Some(target) = geofence else {
        return Ok(CheckInPlan {
            coordinate,
            distance_m: None,
        });
    };

    let check = validate_location(Some(coordinate), Some(target));
    if !check.is_valid {
        return Err(AttendanceError::OutsideGeofence {
            distance_m: check.distance.unwrap_or_default(),
            radius_m: target.radius_m,
        });
    }

    Ok(CheckInPlan {
        coordinate,
        distance_m: check.distance,
    })
}

/// CheckedIn -> CheckedOut. The position is recorded but not validated.
pub fn plan_check_out(
    state: AttendanceState,
    location: &LocationInput,
) -> Result<Coordinate, AttendanceError> {
    match state {
        AttendanceState::CheckedIn => location.resolve(),
        AttendanceState::NoRecord => Err(AttendanceError::NotCheckedIn),
        AttendanceState::CheckedOut => Err(AttendanceError::AlreadyCheckedOut),
        AttendanceState::Excused(status) => Err(AttendanceError::AlreadyRecorded(status)),
    }
}

/// NoRecord -> Sick | Permission, no location involved.
pub fn plan_manual_status(
    state: AttendanceState,
    status: AttendanceStatus,
) -> Result<AttendanceStatus, AttendanceError> {
    if !matches!(status, AttendanceStatus::Sick | AttendanceStatus::Permission) {
        return Err(AttendanceError::InvalidManualStatus(status));
    }

    match state {
        AttendanceState::NoRecord => Ok(status),
        AttendanceState::CheckedIn => Err(AttendanceError::AlreadyCheckedIn),
        AttendanceState::CheckedOut => Err(AttendanceError::AlreadyCheckedOut),
        AttendanceState::Excused(existing) => Err(AttendanceError::AlreadyRecorded(existing)),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub present: u32,
    pub sick: u32,
    pub permission: u32,
    pub absent: u32,
    pub total: u32,
}

pub fn summarize(records: &[AttendanceRecord]) -> AttendanceSummary {
    records
        .iter()
        .fold(AttendanceSummary::default(), |mut acc, record| {
            match record.status() {
                Some(AttendanceStatus::Present) => acc.present += 1,
                Some(AttendanceStatus::Sick) => acc.sick += 1,
                Some(AttendanceStatus::Permission) => acc.permission += 1,
                Some(AttendanceStatus::Absent) | None => acc.absent += 1,
            }
            acc.total += 1;
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(check_in: Option<&str>, check_out: Option<&str>, status: &str) -> AttendanceRecord {
        let time = |t: &str| NaiveTime::parse_from_str(t, "%H:%M").unwrap();
        AttendanceRecord {
            id: "a".into(),
            profile_id: "p".into(),
            school_id: "s".into(),
            date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            check_in_time: check_in.map(time),
            check_out_time: check_out.map(time),
            status: status.into(),
            latitude: None,
            longitude: None,
            location_label: None,
            distance_m: None,
            check_out_latitude: None,
            check_out_longitude: None,
            notes: None,
        }
    }

    fn at(latitude: f64, longitude: f64) -> LocationInput {
        LocationInput {
            location: Some(DeviceLocation {
                latitude,
                longitude,
                accuracy: Some(10.0),
            }),
            location_error: None,
        }
    }

    fn school() -> GeofenceTarget {
        GeofenceTarget {
            center: Coordinate::new(0.0, 0.0),
            radius_m: 100.0,
        }
    }

    #[test]
    fn derives_state_from_record() {
        assert_eq!(AttendanceState::of(None), AttendanceState::NoRecord);
        assert_eq!(
            AttendanceState::of(Some(&record(Some("07:00"), None, "present"))),
            AttendanceState::CheckedIn
        );
        assert_eq!(
            AttendanceState::of(Some(&record(Some("07:00"), Some("15:00"), "present"))),
            AttendanceState::CheckedOut
        );
        assert_eq!(
            AttendanceState::of(Some(&record(None, None, "sick"))),
            AttendanceState::Excused(AttendanceStatus::Sick)
        );
    }

    #[test]
    fn check_in_inside_geofence() {
        let plan = plan_check_in(AttendanceState::NoRecord, &at(0.0, 0.0005), Some(&school())).unwrap();
        assert_eq!(plan.distance_m, Some(56.0));
        assert_eq!(plan.coordinate, Coordinate::new(0.0, 0.0005));
    }

    #[test]
    fn check_in_outside_geofence_reports_distance_and_radius() {
        let err = plan_check_in(AttendanceState::NoRecord, &at(0.0, 0.0009), Some(&school()))
            .unwrap_err();

        assert_eq!(
            err,
            AttendanceError::OutsideGeofence {
                distance_m: 100.0,
                radius_m: 100.0
            }
        );
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("100 m"));
    }

    #[test]
    fn check_in_without_geofence_still_needs_location() {
        let plan = plan_check_in(AttendanceState::NoRecord, &at(5.0, 5.0), None).unwrap();
        assert_eq!(plan.distance_m, None);

        let err = plan_check_in(AttendanceState::NoRecord, &LocationInput::default(), None)
            .unwrap_err();
        assert_eq!(err, AttendanceError::LocationRequired);
    }

    #[test]
    fn geolocation_failure_aborts_check_in() {
        let input = LocationInput {
            location: None,
            location_error: Some(GeolocationFailure::PermissionDenied),
        };

        let err = plan_check_in(AttendanceState::NoRecord, &input, Some(&school())).unwrap_err();
        assert_eq!(err, AttendanceError::Geolocation(GeolocationFailure::PermissionDenied));
        assert_eq!(err.to_string(), GeolocationFailure::PermissionDenied.message());
    }

    #[test]
    fn second_check_in_after_check_out_is_rejected() {
        let done = record(Some("07:00"), Some("15:00"), "present");
        let err = plan_check_in(AttendanceState::of(Some(&done)), &at(0.0, 0.0), Some(&school()))
            .unwrap_err();
        assert_eq!(err, AttendanceError::AlreadyCheckedOut);

        let open = record(Some("07:00"), None, "present");
        let err = plan_check_in(AttendanceState::of(Some(&open)), &at(0.0, 0.0), None).unwrap_err();
        assert_eq!(err, AttendanceError::AlreadyCheckedIn);
    }

    #[test]
    fn check_out_skips_geofence() {
        // far outside any school radius, still accepted
        let coordinate = plan_check_out(AttendanceState::CheckedIn, &at(10.0, 10.0)).unwrap();
        assert_eq!(coordinate, Coordinate::new(10.0, 10.0));
    }

    #[test]
    fn check_out_guards() {
        assert_eq!(
            plan_check_out(AttendanceState::NoRecord, &at(0.0, 0.0)),
            Err(AttendanceError::NotCheckedIn)
        );
        assert_eq!(
            plan_check_out(AttendanceState::CheckedOut, &at(0.0, 0.0)),
            Err(AttendanceError::AlreadyCheckedOut)
        );
        assert_eq!(
            plan_check_out(AttendanceState::CheckedIn, &LocationInput::default()),
            Err(AttendanceError::LocationRequired)
        );
    }

    #[test]
    fn manual_status_only_from_no_record() {
        assert_eq!(
            plan_manual_status(AttendanceState::NoRecord, AttendanceStatus::Sick),
            Ok(AttendanceStatus::Sick)
        );
        assert_eq!(
            plan_manual_status(AttendanceState::CheckedIn, AttendanceStatus::Permission),
            Err(AttendanceError::AlreadyCheckedIn)
        );
        assert_eq!(
            plan_manual_status(
                AttendanceState::Excused(AttendanceStatus::Sick),
                AttendanceStatus::Permission
            ),
            Err(AttendanceError::AlreadyRecorded(AttendanceStatus::Sick))
        );
        assert_eq!(
            plan_manual_status(AttendanceState::NoRecord, AttendanceStatus::Present),
            Err(AttendanceError::InvalidManualStatus(AttendanceStatus::Present))
        );
    }

    #[test]
    fn summarizes_by_status() {
        let records = vec![
            record(Some("07:00"), Some("15:00"), "present"),
            record(Some("07:10"), None, "present"),
            record(None, None, "sick"),
            record(None, None, "absent"),
        ];

        assert_eq!(
            summarize(&records),
            AttendanceSummary {
                present: 2,
                sick: 1,
                permission: 0,
                absent: 1,
                total: 4,
            }
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!("permission".parse(), Ok(AttendanceStatus::Permission));
        assert_eq!(AttendanceStatus::Sick.to_string(), "sick");
    }
}
