//! Read-only HTTP query surface.
//!
//! Serves stored product summaries over JSON for dashboards. Pure reads —
//! all writes go through the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/products/{id}/summary` | Current summary for a product |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! A product with no summary yet returns 404 with
//! `{ "error": { "code": "not_found", "message": "..." } }` — absence of a
//! summary is a real state, not an empty summary.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards can
//! query directly.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::report;

/// Shared state for route handlers.
#[derive(Clone)]
struct AppState {
    pool: Arc<SqlitePool>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

fn error_response(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: ErrorDetail { code, message },
        }),
    )
        .into_response()
}

/// Start the query server on the address configured in `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = match &config.server {
        Some(server) => server.bind.clone(),
        None => anyhow::bail!("[server].bind must be configured to serve"),
    };

    let pool = db::connect(config).await?;
    let state = AppState {
        pool: Arc::new(pool),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/products/{id}/summary", get(get_summary))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("serving summaries on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_summary(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match report::load_summary(&state.pool, &id).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no summary for product: {}", id),
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}
