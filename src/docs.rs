use crate::api::{
    admin::{
        BulkImportRequest, BulkImportResponse, CreateUserRequest, ImportRowResult, ImportStudent,
        ResetPasswordRequest, SendEmailRequest,
    },
    announcement::CreateAnnouncement,
    attendance::{
        AttendanceListResponse, CheckInRequest, ClassAttendanceEntry, ClassAttendanceRequest,
        LocationPreview, ManualStatusRequest, SummaryResponse, TodayResponse,
    },
    class::CreateClass,
    grade::{CreateGrade, UpdateGrade},
    profile::{ProfileListResponse, UpdateProfile},
    schedule::{CreateSchedule, CurrentSchedule},
    school::UpdateGeofence,
    subject::CreateSubject,
};
use crate::model::{
    announcement::{Announcement, Audience},
    attendance::{
        AttendanceRecord, AttendanceStatus, AttendanceSummary, DeviceLocation, GeolocationFailure,
        LocationInput,
    },
    class::Class,
    grade::{AssessmentType, Grade, ReportCard, SubjectSummary},
    notification::Notification,
    profile::Profile,
    role::Role,
    schedule::Schedule,
    school::School,
    subject::Subject,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SIAKAD API",
        version = "1.0.0",
        description = r#"
## School Information System (SIAKAD)

Academic administration for schools: people, classes, grades, schedules,
announcements and **geofenced attendance**.

### 🔹 Key Features
- **Attendance**
  - Check-in validated against the school geofence, check-out, sick/permission reports
  - Monthly summaries and class roll calls
- **Academics**
  - Classes, subjects, schedules, grades and report cards
- **Communication**
  - Announcements by audience, personal notifications, live SSE streams
- **Administration**
  - Account creation, password reset, bulk student import, email outbox

### 🔐 Security
`/api` endpoints require a **JWT Bearer** token issued by the identity provider.
`/admin` endpoints require the `x-admin-secret` header and are rate limited per client;
a `429` response carries `Retry-After`.

### 📦 Response Format
- JSON bodies; errors are `{"message": "..."}`
- Pagination on list endpoints via `page` and `per_page`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::mark_status,
        crate::api::attendance::today,
        crate::api::attendance::preview_location,
        crate::api::attendance::list_attendance,
        crate::api::attendance::monthly_summary,
        crate::api::attendance::record_class,

        crate::api::school::get_school,
        crate::api::school::update_geofence,

        crate::api::class::create_class,
        crate::api::class::list_classes,
        crate::api::subject::create_subject,
        crate::api::subject::list_subjects,

        crate::api::profile::list_profiles,
        crate::api::profile::get_me,
        crate::api::profile::get_profile,
        crate::api::profile::update_profile,

        crate::api::grade::create_grade,
        crate::api::grade::list_grades,
        crate::api::grade::update_grade,
        crate::api::grade::delete_grade,
        crate::api::grade::get_report_card,

        crate::api::schedule::create_schedule,
        crate::api::schedule::list_schedules,
        crate::api::schedule::delete_schedule,
        crate::api::schedule::today_schedule,
        crate::api::schedule::check_window,

        crate::api::announcement::create_announcement,
        crate::api::announcement::list_announcements,
        crate::api::announcement::delete_announcement,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_read,
        crate::api::notification::mark_all_read,

        crate::api::realtime::stream_notifications,
        crate::api::realtime::stream_announcements,
        crate::api::realtime::stream_attendance,

        crate::api::admin::create_user,
        crate::api::admin::delete_user,
        crate::api::admin::reset_password,
        crate::api::admin::bulk_import,
        crate::api::admin::send_email
    ),
    components(
        schemas(
            AttendanceRecord,
            AttendanceStatus,
            AttendanceSummary,
            DeviceLocation,
            GeolocationFailure,
            LocationInput,
            CheckInRequest,
            ManualStatusRequest,
            TodayResponse,
            LocationPreview,
            AttendanceListResponse,
            SummaryResponse,
            ClassAttendanceEntry,
            ClassAttendanceRequest,
            School,
            UpdateGeofence,
            Class,
            CreateClass,
            Subject,
            CreateSubject,
            Role,
            Profile,
            UpdateProfile,
            ProfileListResponse,
            AssessmentType,
            Grade,
            CreateGrade,
            UpdateGrade,
            ReportCard,
            SubjectSummary,
            Schedule,
            CreateSchedule,
            CurrentSchedule,
            Audience,
            Announcement,
            CreateAnnouncement,
            Notification,
            CreateUserRequest,
            ResetPasswordRequest,
            ImportStudent,
            BulkImportRequest,
            ImportRowResult,
            BulkImportResponse,
            SendEmailRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Geofenced check-in/out and attendance records"),
        (name = "School", description = "School settings and geofence"),
        (name = "Class", description = "Class management APIs"),
        (name = "Subject", description = "Subject management APIs"),
        (name = "Profile", description = "Students, teachers and staff"),
        (name = "Grade", description = "Grades and report cards"),
        (name = "Schedule", description = "Lesson timetable"),
        (name = "Announcement", description = "School announcements"),
        (name = "Notification", description = "Personal notifications"),
        (name = "Realtime", description = "Server-sent event streams"),
        (name = "Admin", description = "Shared-secret user management"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
