use sqlx::{MySqlPool, mysql::MySqlPoolOptions};
use tracing::info;

const MAX_CONNECTIONS: u32 = 10;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await?;

    info!(max_connections = MAX_CONNECTIONS, "Database pool ready");
    Ok(pool)
}
