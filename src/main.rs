use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use minddrag_api::config::{self, StoreBackend};
use minddrag_api::database::memory::MemoryStore;
use minddrag_api::database::postgres::PgStore;
use minddrag_api::database::EntityStore;
use minddrag_api::handlers::{annotations, dragables, teams, users, AppState};
use minddrag_api::middleware::basic_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, MINDDRAG_STORE, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Minddrag API in {:?} mode", config.environment);

    let store: Arc<dyn EntityStore> = match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data will not survive a restart");
            Arc::new(MemoryStore::new(config.policy.cascade_delete))
        }
        StoreBackend::Postgres => {
            let database_url = std::env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set for the postgres store");
            let store = PgStore::connect(
                &database_url,
                config.database.max_connections,
                config.database.connection_timeout,
                config.policy.cascade_delete,
            )
            .await
            .unwrap_or_else(|e| panic!("failed to connect to the database: {}", e));
            Arc::new(store)
        }
    };

    let app = app(AppState { store });

    // Allow tests or deployments to override port via env
    let port = std::env::var("MINDDRAG_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(config.server.port);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Minddrag API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    let router = Router::new()
        // Public utility endpoints
        .route("/", get(root))
        .route("/health", get(health))
        // Identity registration (public)
        .route("/auth/register", post(users::register))
        // Resource surface
        .merge(team_routes())
        .merge(dragable_routes())
        .merge(annotation_routes())
        // Credential resolution for everything above
        .layer(middleware::from_fn_with_state(
            state.clone(),
            basic_auth_middleware,
        ));

    let router = if config::config().security.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn team_routes() -> Router<AppState> {
    Router::new()
        .route("/api/1.0/teams", get(teams::list).post(teams::create))
        .route(
            "/api/1.0/teams/:name",
            get(teams::get).put(teams::update).delete(teams::delete),
        )
}

fn dragable_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/1.0/dragables",
            get(dragables::list).post(dragables::create),
        )
        .route(
            "/api/1.0/dragables/:hash",
            get(dragables::get)
                .put(dragables::update)
                .delete(dragables::delete),
        )
}

fn annotation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/1.0/annotations",
            get(annotations::list).post(annotations::create),
        )
        .route("/api/1.0/annotations/:hash", get(annotations::get))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let prefix = &config::config().server.host_prefix;

    Json(json!({
        "success": true,
        "data": {
            "name": "Minddrag API",
            "version": version,
            "description": "Content-sharing API for teams, dragables and annotations",
            "endpoints": {
                "home": format!("{}/ (public)", prefix),
                "register": format!("{}/auth/register (public)", prefix),
                "teams": format!("{}/api/1.0/teams[/:name]", prefix),
                "dragables": format!("{}/api/1.0/dragables[/:hash] (basic auth)", prefix),
                "annotations": format!("{}/api/1.0/annotations[/:hash] (basic auth)", prefix),
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
