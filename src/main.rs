use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::{middleware::from_fn_with_state, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use ecole_api::database::{meta, pool};
use ecole_api::{config, handlers, middleware, AppState};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecole_api=info,tower_http=info".into()),
        )
        .init();

    let config = config::config();
    info!("Starting ecole-api in {:?} mode", config.environment);

    if let Err(e) = meta::validate_registry() {
        error!("invalid collection registry: {}", e);
        std::process::exit(1);
    }

    let pool = match pool::connect().await {
        Ok(pool) => pool,
        Err(e) => {
            error!("database connection failed: {}", e);
            std::process::exit(1);
        }
    };
    let state = AppState { pool };

    let app = app(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    info!("ecole-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/login", post(handlers::auth::login))
        .merge(protected_routes(state.clone()))
        .layer(cors_layer())
        .with_state(state);

    if config::config().api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/schools",
            get(handlers::schools::list).post(handlers::schools::create),
        )
        .route(
            "/api/v1/schools/:id",
            get(handlers::schools::get)
                .put(handlers::schools::update)
                .delete(handlers::schools::delete),
        )
        .route(
            "/api/v1/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/api/v1/users/:id",
            get(handlers::users::get)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route(
            "/api/v1/school-years",
            get(handlers::school_years::list).post(handlers::school_years::create),
        )
        .route(
            "/api/v1/school-years/:code",
            get(handlers::school_years::get)
                .put(handlers::school_years::update)
                .delete(handlers::school_years::delete),
        )
        .route(
            "/api/v1/classes",
            get(handlers::classes::list).post(handlers::classes::create),
        )
        .route(
            "/api/v1/classes/:id",
            get(handlers::classes::get)
                .put(handlers::classes::update)
                .delete(handlers::classes::delete),
        )
        .route(
            "/api/v1/students",
            get(handlers::students::list).post(handlers::students::create),
        )
        .route(
            "/api/v1/students/:registrationId",
            get(handlers::students::get)
                .put(handlers::students::update)
                .delete(handlers::students::delete),
        )
        .route(
            "/api/v1/evaluation-types",
            get(handlers::evaluation_types::list).post(handlers::evaluation_types::create),
        )
        .route(
            "/api/v1/evaluation-types/:code",
            get(handlers::evaluation_types::get)
                .put(handlers::evaluation_types::update)
                .delete(handlers::evaluation_types::delete),
        )
        .route(
            "/api/v1/compositions",
            get(handlers::compositions::list).post(handlers::compositions::create),
        )
        .route(
            "/api/v1/compositions/:code",
            get(handlers::compositions::get)
                .put(handlers::compositions::update)
                .delete(handlers::compositions::delete),
        )
        .route(
            "/api/v1/notes",
            get(handlers::notes::list).post(handlers::notes::create),
        )
        .route(
            "/api/v1/notes/eleve/:studentId",
            get(handlers::notes::list_for_student),
        )
        .route(
            "/api/v1/notes/:studentId/:evaluationId/:compositionId",
            put(handlers::notes::update).delete(handlers::notes::delete),
        )
        .route(
            "/api/v1/averages",
            get(handlers::averages::list).post(handlers::averages::compute),
        )
        .route(
            "/api/v1/averages/eleve/:studentId",
            get(handlers::averages::list_for_student),
        )
        .route(
            "/api/v1/averages/composition/:code",
            get(handlers::averages::list_for_composition),
        )
        .route(
            "/api/v1/averages/:studentId/:compositionId",
            put(handlers::averages::update).delete(handlers::averages::delete),
        )
        .route(
            "/api/v1/results",
            get(handlers::results::list).post(handlers::results::upsert),
        )
        .route(
            "/api/v1/results/annee/:yearCode",
            get(handlers::results::list_for_year),
        )
        .route(
            "/api/v1/results/:studentId/:yearCode",
            put(handlers::results::update).delete(handlers::results::delete),
        )
        .layer(from_fn_with_state(state, middleware::authenticate))
}

/// An empty origin list (production default) falls back to permissive CORS;
/// origins are pinned through the CORS_ORIGINS env override.
fn cors_layer() -> CorsLayer {
    let origins = &config::config().security.cors_origins;
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "ecole-api",
            "version": version,
            "description": "School records API: enrollment, grading and annual results",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/api/v1/login (public - token acquisition)",
                "schools": "/api/v1/schools[/:id] (admin)",
                "users": "/api/v1/users[/:id] (admin)",
                "school_years": "/api/v1/school-years[/:code] (admin)",
                "classes": "/api/v1/classes[/:id] (protected)",
                "students": "/api/v1/students[/:registrationId] (protected)",
                "evaluation_types": "/api/v1/evaluation-types[/:code] (protected)",
                "compositions": "/api/v1/compositions[/:code] (protected)",
                "notes": "/api/v1/notes (protected, teacher writes)",
                "averages": "/api/v1/averages (protected, teacher computes)",
                "results": "/api/v1/results (admin)",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match pool::health_check(&state.pool).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Router assembly must type-check and build with every route and layer
    // attached; a lazy pool never opens a connection.
    #[tokio::test]
    async fn router_builds_with_all_routes_and_layers() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/ecole_test")
            .expect("lazy pool");
        let _app = app(AppState { pool });
    }
}
