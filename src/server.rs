//! HTTP snapshot feed and administrative reset.

use std::{future::IntoFuture, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, time::timeout};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{
    config::PresentationConfig,
    protocol::Diagnostics,
    runtime::{
        handle::{RuntimeError, ScoreboardHandle},
        publisher::PublishedSnapshot,
    },
};

/// Longest a `/api/snapshot?since=` request is held open.
const MAX_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("scoreboard is not running")]
    Unavailable(#[from] RuntimeError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub scoreboard: ScoreboardHandle,
    pub presentation: Arc<PresentationConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    /// Hold the request until a version above this one exists.
    pub since: Option<u64>,
    /// How long to hold it, capped at thirty seconds.
    pub wait_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub ok: bool,
    pub generation: u64,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/config", get(config_handler))
        .route("/api/diag", get(diag_handler))
        .route("/api/debug", get(diag_handler))
        .route("/api/reset", post(reset_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serves until `shutdown` is cancelled, then gives in-flight requests up to
/// `grace` to finish. Connections still open after that are abandoned.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "serving scoreboard");
    }
    let serving = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => return Ok(result?),
        _ = shutdown.cancelled() => {}
    }
    match timeout(grace, serving).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "open connections did not drain in time");
            Ok(())
        }
    }
}

pub async fn snapshot_handler(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<Arc<PublishedSnapshot>> {
    let latest = state.scoreboard.latest();
    let Some(since) = query.since.filter(|&v| v >= latest.version) else {
        return Json(latest);
    };

    let wait = query
        .wait_ms
        .map_or(MAX_WAIT, Duration::from_millis)
        .min(MAX_WAIT);
    let mut feed = state.scoreboard.feed();
    match tokio::time::timeout(wait, feed.newer_than(since)).await {
        Ok(Some(newer)) => Json(newer),
        _ => Json(state.scoreboard.latest()),
    }
}

pub async fn config_handler(State(state): State<AppState>) -> Json<Arc<PresentationConfig>> {
    Json(Arc::clone(&state.presentation))
}

pub async fn diag_handler(State(state): State<AppState>) -> Result<Json<Diagnostics>, AppError> {
    Ok(Json(state.scoreboard.diagnostics().await?))
}

pub async fn reset_handler(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    let generation = state.scoreboard.reset().await.inspect_err(|err| {
        warn!(error = %err, "reset request failed");
    })?;
    info!(generation, "reset requested over http");
    Ok(Json(ResetResponse {
        ok: true,
        generation,
    }))
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}
