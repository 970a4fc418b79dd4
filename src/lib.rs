pub mod aggregation;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod query;

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
}
