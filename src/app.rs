//! Application state, router and server entry points.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{self, AppConfig};
use crate::core::audit::AuditRecorder;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::store::{EntityKind, EntityStore, MemoryStore, RemoteStore, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub audit: AuditRecorder,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        let audit = AuditRecorder::new(store.clone());
        Self { store, audit }
    }
}

/// Build the entity store adapter the config names.
pub fn build_store(cfg: &AppConfig) -> Result<Arc<dyn EntityStore>, StoreError> {
    match cfg.store.backend.as_str() {
        "remote" => Ok(Arc::new(RemoteStore::from_config(&cfg.store)?)),
        _ => Ok(Arc::new(MemoryStore::new())),
    }
}

pub fn app(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/api/notifications/public-key",
            post(handlers::notifications::public_key),
        )
        .with_state(state.clone());

    let protected = Router::new()
        // Identity
        .route("/api/auth/whoami", post(handlers::auth::whoami))
        // Projects
        .route("/api/projects/list", post(handlers::projects::list))
        .route("/api/projects/create", post(handlers::projects::create))
        .route("/api/projects/get", post(handlers::projects::get))
        .route("/api/projects/update", post(handlers::projects::update))
        .route("/api/projects/delete", post(handlers::projects::delete))
        // Tasks
        .route("/api/tasks/list", post(handlers::tasks::list))
        .route("/api/tasks/create", post(handlers::tasks::create))
        .route("/api/tasks/update", post(handlers::tasks::update))
        .route("/api/tasks/delete", post(handlers::tasks::delete))
        // RFIs
        .route("/api/rfis/list", post(handlers::rfis::list))
        .route("/api/rfis/create", post(handlers::rfis::create))
        .route("/api/rfis/update", post(handlers::rfis::update))
        .route("/api/rfis/delete", post(handlers::rfis::delete))
        // Financials
        .route("/api/financials/list", post(handlers::financials::lines_list))
        .route("/api/financials/create", post(handlers::financials::line_create))
        .route("/api/financials/delete", post(handlers::financials::line_delete))
        .route("/api/cost-codes/list", post(handlers::financials::codes_list))
        .route("/api/cost-codes/create", post(handlers::financials::code_create))
        .route("/api/cost-codes/delete", post(handlers::financials::code_delete))
        // Documents
        .route("/api/documents/list", post(handlers::documents::list))
        .route("/api/documents/create", post(handlers::documents::create))
        .route("/api/documents/delete", post(handlers::documents::delete))
        .route("/api/documents/link", post(handlers::documents::link))
        // Notifications
        .route(
            "/api/notifications/subscribe",
            post(handlers::notifications::subscribe),
        )
        // Integrations
        .route("/api/integrations/status", post(handlers::integrations::status))
        // Admin diagnostics
        .route("/api/admin/integrity-check", post(handlers::integrity::check))
        .layer(axum_middleware::from_fn(jwt_auth_middleware))
        .with_state(state);

    let router = public.merge(protected).layer(TraceLayer::new_for_http());

    if config::config().security.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Run the HTTP server until shutdown.
pub async fn serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("starting Sitework API in {:?} mode", config.environment);

    let store = build_store(config)?;
    let state = AppState::new(store);
    let app = app(state);

    // Allow tests or deployments to override port via env
    let port = port_override
        .or_else(|| {
            std::env::var("SITEWORK_PORT")
                .ok()
                .or_else(|| std::env::var("PORT").ok())
                .and_then(|s| s.parse::<u16>().ok())
        })
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    println!("🚀 Sitework API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Sitework API",
            "version": version,
            "description": "Construction project management backend (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "push_key": "/api/notifications/public-key (public)",
                "auth": "/api/auth/whoami (protected)",
                "projects": "/api/projects/* (protected)",
                "tasks": "/api/tasks/* (protected)",
                "rfis": "/api/rfis/* (protected)",
                "financials": "/api/financials/*, /api/cost-codes/* (protected)",
                "documents": "/api/documents/* (protected)",
                "integrations": "/api/integrations/status (protected)",
                "admin": "/api/admin/integrity-check (restricted, admin only)",
            }
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.list(EntityKind::Project, None).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
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
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "entity store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
