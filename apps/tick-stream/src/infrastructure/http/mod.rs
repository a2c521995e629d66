//! HTTP and WebSocket Endpoint
//!
//! Serves subscribers and operators on one port:
//!
//! - `GET /ws/ticks` - WebSocket stream: full backlog replay, then live ticks
//! - `GET /api/ticks` - One-shot JSON snapshot of the current backlog
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (backlog loaded)
//! - `GET /metrics` - Prometheus metrics in text format
//!
//! The WebSocket handler is the transport side of the broadcaster: attach
//! happens on upgrade, detach on any send failure, close frame, or lag
//! past the live channel capacity. One slow socket never stalls delivery
//! to the rest; each connection drains its own receiver.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::domain::session::session_window;
use crate::domain::tick::Tick;
use crate::infrastructure::broadcast::SharedTickHub;
use crate::infrastructure::metrics;

// =============================================================================
// Server State
// =============================================================================

/// Shared state for all HTTP handlers.
pub struct ApiState {
    symbol: String,
    version: String,
    started_at: Instant,
    hub: SharedTickHub,
}

impl ApiState {
    /// Create new server state.
    #[must_use]
    pub fn new(symbol: String, version: String, hub: SharedTickHub) -> Self {
        Self {
            symbol,
            version,
            started_at: Instant::now(),
            hub,
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server hosting the WebSocket, snapshot, health, and metrics routes.
pub struct ApiServer {
    port: u16,
    state: Arc<ApiState>,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<ApiState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// Build the route table over the given state.
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws/ticks", get(ws_handler))
        .route("/api/ticks", get(snapshot_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// WebSocket Handler
// =============================================================================

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (snapshot, live_rx) = state.hub.attach();
    metrics::set_subscribers(state.hub.subscriber_count() as f64);
    tracing::debug!(backlog = snapshot.len(), "Subscriber attached");

    stream_to_subscriber(socket, snapshot, live_rx).await;

    // Receiver dropped above; the hub no longer counts this subscriber.
    metrics::set_subscribers(state.hub.subscriber_count() as f64);
    tracing::debug!("Subscriber detached");
}

async fn stream_to_subscriber(
    socket: WebSocket,
    snapshot: Vec<Tick>,
    mut live_rx: tokio::sync::broadcast::Receiver<Tick>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Replay the backlog before any live tick can reach this subscriber.
    for tick in snapshot {
        if send_tick(&mut sender, &tick).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            live = live_rx.recv() => match live {
                Ok(tick) => {
                    if send_tick(&mut sender, &tick).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Too slow to keep the live channel; a reconnect gets a
                    // fresh snapshot instead of a gapped stream.
                    tracing::warn!(skipped, "Subscriber lagged, disconnecting");
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = pong_reply(text.as_str())
                        && sender.send(Message::Text(reply.into())).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_tick<S>(sender: &mut S, tick: &Tick) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let Ok(payload) = serde_json::to_string(tick) else {
        tracing::error!(time = %tick.time, "Failed to serialize tick");
        return Ok(());
    };
    sender
        .send(Message::Text(payload.into()))
        .await
        .map_err(|_| ())
}

/// Answer client heartbeats: `{"type":"ping"}` JSON (echoing the payload
/// timestamp for client-side latency measurement) or a plain `ping`.
fn pong_reply(text: &str) -> Option<String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        if value.get("type").and_then(|t| t.as_str()) == Some("ping") {
            let timestamp = value
                .get("data")
                .and_then(|d| d.get("timestamp"))
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            return Some(
                serde_json::json!({
                    "type": "pong",
                    "data": { "timestamp": timestamp }
                })
                .to_string(),
            );
        }
        return None;
    }
    (text == "ping").then(|| "pong".to_string())
}

// =============================================================================
// Snapshot Handler
// =============================================================================

async fn snapshot_handler(State(state): State<Arc<ApiState>>) -> Json<Vec<Tick>> {
    Json(state.hub.snapshot())
}

// =============================================================================
// Health Handlers
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Streamed symbol.
    pub symbol: String,
    /// Current session window.
    pub session: SessionStatus,
    /// Backlog state.
    pub backlog: BacklogStatus,
    /// Attached subscriber count.
    pub subscribers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Backlog is loaded, or the session has not opened yet.
    Healthy,
    /// Session is underway but the backlog is still empty.
    Degraded,
}

/// Session window status.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Trading day the window covers.
    pub trading_day: NaiveDate,
    /// Market open instant.
    pub open: DateTime<Utc>,
    /// Market close instant.
    pub close: DateTime<Utc>,
    /// Whether the session is over.
    pub closed: bool,
}

/// Backlog status.
#[derive(Debug, Clone, Serialize)]
pub struct BacklogStatus {
    /// Ticks currently held.
    pub ticks: usize,
    /// Epoch seconds of the last admitted tick, if any.
    pub high_water_mark: Option<i64>,
}

async fn health_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(build_health_response(&state, Utc::now()))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if is_ready(&state, Utc::now()) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    metrics::get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &ApiState, now: DateTime<Utc>) -> HealthResponse {
    let window = session_window(now);
    let backlog_len = state.hub.backlog_len();

    let status = if backlog_len > 0 || now < window.open {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: now,
        symbol: state.symbol.clone(),
        session: SessionStatus {
            trading_day: window.trading_day,
            open: window.open,
            close: window.close,
            closed: window.is_closed_at(now),
        },
        backlog: BacklogStatus {
            ticks: backlog_len,
            high_water_mark: state.hub.high_water_mark().map(|t| t.timestamp()),
        },
        subscribers: state.hub.subscriber_count(),
    }
}

fn is_ready(state: &ApiState, now: DateTime<Utc>) -> bool {
    state.hub.backlog_len() > 0 || now < session_window(now).open
}

// =============================================================================
// Tests
// =============================================================================
