// Copyright 2026 Pitchkit Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for Pitchkit.
//!
//! A thin JSON surface over [`Pipeline`]: one extraction per request, the
//! classified failure when there is nothing usable, and a live SSE stream of
//! pipeline events.

use crate::events::EventBus;
use crate::failure::{classify_failure, classify_report, FailureKind};
use crate::pipeline::Pipeline;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// State shared by all handlers.
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub events: Arc<EventBus>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire `pipeline` to a fresh event bus.
    pub fn new(pipeline: Pipeline) -> Self {
        let events = Arc::new(EventBus::default());
        Self {
            pipeline: Arc::new(pipeline.with_events(Arc::clone(&events))),
            events,
            started_at: Instant::now(),
        }
    }
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/events", get(events_sse))
        .route("/api/v1/extract", post(handle_extract))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given port.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(Arc::clone(&state));
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.pipeline.browser().shutdown().await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let browser = state.pipeline.browser();
    Json(json!({
        "running": true,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs_f64(),
        "browser_warm": browser.is_warm().await,
        "browser_launches": browser.launches(),
    }))
}

#[derive(Deserialize)]
struct ExtractRequest {
    url: String,
}

async fn handle_extract(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractRequest>,
) -> Response {
    let url = match url::Url::parse(body.url.trim()) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "kind": "invalid_url",
                    "message": format!("not an http(s) url: {}", body.url),
                })),
            )
                .into_response();
        }
    };

    match state.pipeline.extract_with_report(&url).await {
        Ok(report) => match classify_report(&report) {
            None => Json(json!({
                "text": report.text,
                "source": report.source,
                "static_status": report.static_status,
                "truncated": report.truncated,
            }))
            .into_response(),
            Some(kind) => failure_response(StatusCode::UNPROCESSABLE_ENTITY, kind),
        },
        Err(e) => {
            warn!("extraction failed for {url}: {e}");
            failure_response(StatusCode::BAD_GATEWAY, classify_failure(&e.to_string()))
        }
    }
}

fn failure_response(status: StatusCode, kind: FailureKind) -> Response {
    (
        status,
        Json(json!({ "kind": kind, "message": kind.user_message() })),
    )
        .into_response()
}

/// Server-Sent Events endpoint streaming every pipeline event.
async fn events_sse(
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        return Some((Ok::<_, Infallible>(Event::default().data(json)), rx));
                    }
                }
                // Slow consumer; skip what was missed.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
