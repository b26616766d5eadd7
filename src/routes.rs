use crate::{
    api::{
        admin, announcement, attendance, class, grade, notification, profile, realtime, schedule,
        school, subject,
    },
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-scope limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .expect("non-zero period and burst size");
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Shared-secret routes; every handler runs admin_guard with its own policy
    cfg.service(
        web::scope("/admin")
            // /admin/users
            .service(web::resource("/users").route(web::post().to(admin::create_user)))
            // /admin/users/{id}
            .service(web::resource("/users/{id}").route(web::delete().to(admin::delete_user)))
            // /admin/users/{id}/reset-password
            .service(
                web::resource("/users/{id}/reset-password")
                    .route(web::post().to(admin::reset_password)),
            )
            // /admin/students/import
            .service(
                web::resource("/students/import").route(web::post().to(admin::bulk_import)),
            )
            // /admin/emails
            .service(web::resource("/emails").route(web::post().to(admin::send_email))),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(web::resource("").route(web::get().to(attendance::list_attendance)))
                    .service(
                        web::resource("/check-in").route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out").route(web::post().to(attendance::check_out)),
                    )
                    .service(
                        web::resource("/status").route(web::post().to(attendance::mark_status)),
                    )
                    .service(web::resource("/today").route(web::get().to(attendance::today)))
                    .service(
                        web::resource("/validate-location")
                            .route(web::post().to(attendance::preview_location)),
                    )
                    .service(
                        web::resource("/summary").route(web::get().to(attendance::monthly_summary)),
                    )
                    .service(
                        web::resource("/class").route(web::post().to(attendance::record_class)),
                    ),
            )
            .service(
                web::scope("/schools")
                    .service(web::resource("/{id}").route(web::get().to(school::get_school)))
                    .service(
                        web::resource("/{id}/geofence")
                            .route(web::put().to(school::update_geofence)),
                    ),
            )
            .service(
                web::resource("/classes")
                    .route(web::get().to(class::list_classes))
                    .route(web::post().to(class::create_class)),
            )
            .service(
                web::resource("/subjects")
                    .route(web::get().to(subject::list_subjects))
                    .route(web::post().to(subject::create_subject)),
            )
            .service(
                web::scope("/profiles")
                    .service(web::resource("").route(web::get().to(profile::list_profiles)))
                    // registered before /{id} so "me" is not taken for an id
                    .service(web::resource("/me").route(web::get().to(profile::get_me)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(profile::get_profile))
                            .route(web::patch().to(profile::update_profile)),
                    ),
            )
            .service(
                web::scope("/grades")
                    .service(
                        web::resource("")
                            .route(web::get().to(grade::list_grades))
                            .route(web::post().to(grade::create_grade)),
                    )
                    .service(
                        web::resource("/report/{student_id}")
                            .route(web::get().to(grade::get_report_card)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(grade::update_grade))
                            .route(web::delete().to(grade::delete_grade)),
                    ),
            )
            .service(
                web::scope("/schedules")
                    .service(
                        web::resource("")
                            .route(web::get().to(schedule::list_schedules))
                            .route(web::post().to(schedule::create_schedule)),
                    )
                    .service(web::resource("/today").route(web::get().to(schedule::today_schedule)))
                    .service(web::resource("/window").route(web::get().to(schedule::check_window)))
                    .service(
                        web::resource("/{id}").route(web::delete().to(schedule::delete_schedule)),
                    ),
            )
            .service(
                web::scope("/announcements")
                    .service(
                        web::resource("")
                            .route(web::get().to(announcement::list_announcements))
                            .route(web::post().to(announcement::create_announcement)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::delete().to(announcement::delete_announcement)),
                    ),
            )
            .service(
                web::scope("/notifications")
                    .service(
                        web::resource("").route(web::get().to(notification::list_notifications)),
                    )
                    .service(
                        web::resource("/read-all").route(web::put().to(notification::mark_all_read)),
                    )
                    .service(
                        web::resource("/{id}/read").route(web::put().to(notification::mark_read)),
                    ),
            )
            .service(
                web::scope("/realtime")
                    .service(
                        web::resource("/notifications")
                            .route(web::get().to(realtime::stream_notifications)),
                    )
                    .service(
                        web::resource("/announcements")
                            .route(web::get().to(realtime::stream_announcements)),
                    )
                    .service(
                        web::resource("/attendance")
                            .route(web::get().to(realtime::stream_attendance)),
                    ),
            ),
    );
}
