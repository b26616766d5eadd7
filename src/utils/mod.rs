pub mod db_utils;
pub mod email_filter;
pub mod geofence_cache;
pub mod rate_limiter;
pub mod realtime;
