use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::io;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod geo;
mod model;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::utils::{
    email_filter::EmailRegistry, geofence_cache::GeofenceCache, rate_limiter::FixedWindowLimiter,
    realtime::RealtimeHub,
};
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

const EMAIL_WARMUP_BATCH: usize = 500;

#[get("/")]
async fn index() -> impl Responder {
    "SIAKAD API"
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        io::Error::other(format!("{e:#}"))
    })?;

    info!("Server starting...");

    let pool = init_db(&config.database_url).await.map_err(|e| {
        error!(error = %e, "Failed to connect to database");
        io::Error::other(e)
    })?;

    // Services shared by every worker
    let limiter = Data::new(FixedWindowLimiter::new());
    let hub = Data::new(RealtimeHub::new());
    let schools = Data::new(GeofenceCache::new(config.geofence_cache_ttl));
    let emails = Data::new(EmailRegistry::new());

    let pool_for_warmup = pool.clone();
    let emails_for_warmup = emails.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = emails_for_warmup
            .warmup(&pool_for_warmup, EMAIL_WARMUP_BATCH)
            .await
        {
            error!(error = %e, "Failed to warm up email filter");
        }
    });

    // Clone values for the closure (avoid move issues)
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(limiter.clone())
            .app_data(hub.clone())
            .app_data(schools.clone())
            .app_data(emails.clone())
            .service(index)
            // Admin + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
