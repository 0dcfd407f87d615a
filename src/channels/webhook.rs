//! HTTP surface: the Chatwoot webhook and a health check.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::get,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::channels::ReplySink;
use crate::channels::chatwoot::WebhookEvent;
use crate::error::PipelineError;
use crate::pipeline::MessageProcessor;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<MessageProcessor>,
    pub sink: Arc<dyn ReplySink>,
}

/// Build the Axum router with the webhook and health routes.
pub fn webhook_routes(processor: Arc<MessageProcessor>, sink: Arc<dyn ReplySink>) -> Router {
    let state = AppState { processor, sink };

    Router::new()
        .route("/", get(health).post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-responder"
    }))
}

// ── Webhook ─────────────────────────────────────────────────────────────

/// Every webhook call is acknowledged with 200 so Chatwoot does not retry;
/// the body says what happened.
async fn webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let status = handle_event(&state, &body).await;
    Json(serde_json::json!({ "status": status }))
}

/// Decode, process and deliver one webhook event. Returns a status label.
async fn handle_event(state: &AppState, body: &[u8]) -> &'static str {
    let event = match WebhookEvent::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Dropping undecodable webhook body");
            return "ignored";
        }
    };

    let message = match event.into_inbound() {
        Ok(message) => message,
        Err(e) => {
            debug!(reason = %e, "Dropping webhook event");
            return "ignored";
        }
    };

    let reply = match state.processor.process(&message).await {
        Ok(reply) => reply,
        Err(PipelineError::AccessDenied { .. }) => return "denied",
        Err(e) => {
            debug!(reason = %e, "Message not processed");
            return "ignored";
        }
    };

    if let Err(e) = state.sink.deliver(&reply).await {
        error!(
            sink = state.sink.name(),
            conversation_id = %reply.conversation_id,
            error = %e,
            "Reply delivery failed"
        );
        return "delivery_failed";
    }

    "replied"
}
