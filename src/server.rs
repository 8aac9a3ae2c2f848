use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::relay::Relay;
use crate::webhook::{self, SignatureError, SIGNATURE_HEADER};

/// Shared state for the webhook handlers.
pub struct AppState {
    relay: Relay,
    channel_secret: String,
}

impl AppState {
    pub fn new(relay: Relay, channel_secret: String) -> Self {
        Self {
            relay,
            channel_secret,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),
    #[error("failed to parse webhook body: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            WebhookError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidPayload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        status.into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health).post(health))
        .route("/callback", post(callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "Service is running"
}

/// LINE webhook receiver.
///
/// Responds 400 on a bad signature and 500 on an unreadable body. Once the
/// events are decoded the response is always 200: forwarding failures are
/// logged by the relay and do not reach the platform.
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    info!("Received webhook");
    debug!("Request body: {}", String::from_utf8_lossy(&body));

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    webhook::verify_signature(&state.channel_secret, &body, signature).map_err(|e| {
        warn!("Rejected webhook: {}", e);
        WebhookError::from(e)
    })?;

    let events = webhook::parse_events(&body).map_err(|e| {
        error!("Webhook handling failed: {}", e);
        WebhookError::from(e)
    })?;

    debug!("Webhook carried {} text message(s)", events.len());
    state.relay.dispatch(&events).await;

    Ok("OK")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Bind `addr` and serve the webhook endpoints until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
