use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::config;
use crate::error::ApiError;

/// Create the shared connection pool from DATABASE_URL with sizing and
/// timeouts taken from configuration.
pub async fn connect() -> Result<PgPool, ApiError> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| ApiError::server_error("DATABASE_URL is not configured"))?;

    let db = &config::config().database;
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(db.idle_timeout_secs))
        .connect(&url)
        .await?;

    info!(max_connections = db.max_connections, "database pool ready");
    Ok(pool)
}

/// Pings the pool to confirm connectivity; used by the health endpoint.
pub async fn health_check(pool: &PgPool) -> Result<(), ApiError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
