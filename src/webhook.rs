//! HTTP front door
//!
//! `GET /telegram/options`, `GET /telegram/health` and the webhook endpoint
//! `POST /telegram/webhook`. The webhook always answers 200 once a request
//! reaches the handler; rejection is reported as `{"ok": false}` so Telegram
//! does not retry-storm a misconfigured deployment. Only an unparseable body
//! gets a 400.

use crate::catalog::{Catalog, ContentDescriptor};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use teloxide::types::Update;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Header Telegram uses to echo the webhook secret
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
/// Path of the webhook endpoint
pub const WEBHOOK_PATH: &str = "/telegram/webhook";

/// Verdict of the shared-secret check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Hand the update on
    Accept,
    /// Drop the update
    Reject,
}

/// Check the inbound secret header against the configured secret.
///
/// No configured secret disables the check. Otherwise the header must be
/// present and match exactly.
#[must_use]
pub fn authenticate(header_secret: Option<&str>, configured_secret: Option<&str>) -> GateDecision {
    match (configured_secret, header_secret) {
        (None, _) => GateDecision::Accept,
        (Some(expected), Some(got)) if expected == got => GateDecision::Accept,
        (Some(_), _) => GateDecision::Reject,
    }
}

/// Body of every webhook response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    /// Whether the update was accepted for dispatch
    pub ok: bool,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    source: &'static str,
}

/// Shared state of the HTTP server
#[derive(Clone)]
pub struct AppState {
    /// Catalog served by the options endpoint
    pub catalog: Arc<Catalog>,
    /// Expected secret header value
    pub webhook_secret: Option<Arc<str>>,
    /// Dispatcher queue; `None` while running in polling mode
    pub updates: Option<mpsc::Sender<Update>>,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/telegram/options", get(list_options))
        .route("/telegram/health", get(health))
        .route(WEBHOOK_PATH, post(handle_webhook))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn list_options(State(state): State<AppState>) -> Json<Vec<ContentDescriptor>> {
    Json(state.catalog.list_all().to_vec())
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        source: "telegram-bot",
    })
}

#[instrument(name = "telegram.webhook", skip_all)]
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let header_secret = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if authenticate(header_secret, state.webhook_secret.as_deref()) == GateDecision::Reject {
        warn!(header_present = header_secret.is_some(), "Webhook secret mismatch, update dropped");
        return (StatusCode::OK, Json(WebhookAck { ok: false }));
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Malformed webhook payload");
            return (StatusCode::BAD_REQUEST, Json(WebhookAck { ok: false }));
        }
    };

    let Some(updates) = &state.updates else {
        debug!(update_id = update.id.0, "Webhook call while polling, update dropped");
        return (StatusCode::OK, Json(WebhookAck { ok: false }));
    };

    let update_id = update.id.0;
    if let Err(e) = updates.send(update).await {
        warn!(update_id, "Dispatcher queue closed: {e}");
        return (StatusCode::OK, Json(WebhookAck { ok: false }));
    }

    debug!(update_id, "Update queued");
    (StatusCode::OK, Json(WebhookAck { ok: true }))
}
