//! HTTP REST API for the Webfootprint analyzer.
//!
//! A thin axum layer over [`Analyzer`]: one POST endpoint accepts a target
//! URL and returns the analysis id immediately, a GET endpoint polls the
//! growing record, and an SSE endpoint streams progress events from the
//! shared bus.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use webfootprint::events::event_matches_analysis;
use webfootprint::store::RecordStore;
use webfootprint::{Analyzer, EventBus, FootprintError};

/// Shared state for all REST handlers.
pub struct AppState {
    pub analyzer: Analyzer,
    pub store: Arc<dyn RecordStore>,
    pub events: Arc<EventBus>,
    pub started_at: Instant,
    pub analyses_started: AtomicU64,
    pub renderer_available: bool,
}

impl AppState {
    pub fn new(analyzer: Analyzer, renderer_available: bool) -> Self {
        let store = analyzer.store();
        let events = analyzer.events();
        Self {
            analyzer,
            store,
            events,
            started_at: Instant::now(),
            analyses_started: AtomicU64::new(0),
            renderer_available,
        }
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/events", get(events_sse))
        .route("/api/v1/analyses", post(handle_start).options(preflight))
        .route("/api/v1/analyses/:id", get(handle_fetch))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given address.
pub async fn start(bind: IpAddr, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = SocketAddr::from((bind, port));
    info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received shutdown signal");
}

// ── Helpers ─────────────────────────────────────────────────────

/// Pull the target URL out of a raw request body.
///
/// Malformed JSON, a missing `url` key, and a non-string value all collapse
/// to an empty string, which the analyzer rejects as a missing URL.
fn requested_url(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("url").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

fn internal_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "An internal error occurred." })),
    )
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Plain OPTIONS handler. Genuine CORS preflights are answered by the
/// `CorsLayer` before they reach this route.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn handle_start(
    State(state): State<Arc<AppState>>,
    body: String,
) -> (StatusCode, Json<Value>) {
    let url = requested_url(&body);

    match state.analyzer.start_analysis(&url).await {
        Ok(analysis_id) => {
            state.analyses_started.fetch_add(1, Ordering::Relaxed);
            (StatusCode::OK, Json(json!({ "analysis_id": analysis_id })))
        }
        Err(FootprintError::MissingUrl) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid request. 'url' is required." })),
        ),
        Err(e) => {
            error!("failed to start analysis: {e}");
            internal_error()
        }
    }
}

async fn handle_fetch(
    State(state): State<Arc<AppState>>,
    Path(analysis_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.store.fetch(&analysis_id).await {
        Ok(Some(doc)) => (StatusCode::OK, Json(doc)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "analysis not found" })),
        ),
        Err(e) => {
            error!("failed to fetch analysis {analysis_id}: {e}");
            internal_error()
        }
    }
}

/// SSE query parameters.
#[derive(serde::Deserialize, Default)]
struct EventsParams {
    analysis_id: Option<String>,
}

/// Server-Sent Events endpoint for real-time analysis progress.
///
/// Subscribes to the shared event bus and streams events as SSE.
/// Optionally filters to a single run via `?analysis_id=...`.
async fn events_sse(
    Query(params): Query<EventsParams>,
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();
    let id_filter = params.analysis_id;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(ref id) = id_filter {
                        if !event_matches_analysis(&event, id) {
                            continue;
                        }
                    }
                    if let Ok(json) = serde_json::to_string(&event) {
                        yield Ok(Event::default().data(json));
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some events due to a slow consumer
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime_s = state.started_at.elapsed().as_secs_f64();
    Json(json!({
        "running": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime_s,
        "analyses_started": state.analyses_started.load(Ordering::Relaxed),
        "chromium_available": state.renderer_available,
        "resolver_count": state.analyzer.config().resolvers.len(),
    }))
}
