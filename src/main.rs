use axum::{middleware, routing::get, routing::post, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use perks_api::handlers::{auth, provision};
use perks_api::middleware::auth::{optional_auth, require_auth};
use perks_api::state::AppState;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, PERKS_JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = perks_api::config::config();
    tracing::info!("starting perks-api in {:?} mode", config.environment);

    let state = AppState::from_config(config)
        .await
        .unwrap_or_else(|e| panic!("failed to initialize backends: {e:#}"));

    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("perks-api listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Public auth routes (token acquisition)
        .route("/auth/login", post(auth::session_login))
        // Session-bound routes
        .merge(session_routes())
        // Privileged provisioning (service-side authorization)
        .merge(provision_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(auth::session_whoami))
        .layer(middleware::from_fn(require_auth))
}

fn provision_routes() -> Router<AppState> {
    Router::new()
        .route("/api/provision/vendor", post(provision::vendor_create))
        .route("/api/provision/admin-claim", post(provision::admin_claim))
        .layer(middleware::from_fn(optional_auth))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Perks API",
            "version": version,
            "description": "Provisioning and identity backend for the Perks vendor/admin console",
            "endpoints": {
                "home": "/ (public)",
                "login": "POST /auth/login (public - token acquisition)",
                "whoami": "GET /api/auth/whoami (session required)",
                "provision_vendor": "POST /api/provision/vendor (admin claim required)",
                "provision_admin": "POST /api/provision/admin-claim (admin claim required)",
                "health": "/health (public)",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.identity.list_account_ids().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "identity_backend": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "identity backend unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "backend_error": e.to_string()
                }
            })),
        ),
    }
}
