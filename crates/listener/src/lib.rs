//! Webhook receiver.
//!
//! Binds an HTTP server that accepts backup and restore reports from the
//! backup operator and hands each one to a [`handler::Dispatcher`].
//!
//! ## Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/` | Receive one webhook payload |
//! | `GET` | `/health` | Liveness probe |
//!
//! ## Responses
//!
//! Every outcome is logged server-side. The caller also gets a JSON body with
//! a `status` field: `202 accepted` when the dispatcher committed, `400
//! rejected` for undecodable or empty reports, and `502 failed` when a
//! collaborator (record API or broker) failed.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP framing and body decoding live here. No decision
//! logic; that belongs to the [`handler`] crate.

use std::future::Future;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use handler::{BackupReport, DecodeError, DispatchError, DispatchOutcome, Dispatcher};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures running the HTTP server itself.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Why one webhook request did not commit.
#[derive(Debug, Error)]
enum WebhookError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("dispatch task ended abnormally: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, label) = match &self {
            WebhookError::Decode(_)
            | WebhookError::Dispatch(DispatchError::InvalidReport { .. }) => {
                (StatusCode::BAD_REQUEST, "rejected")
            }
            WebhookError::Dispatch(_) => (StatusCode::BAD_GATEWAY, "failed"),
            WebhookError::Aborted(_) => (StatusCode::INTERNAL_SERVER_ERROR, "failed"),
        };
        let body = json!({ "status": label, "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Builds the router (for testing without binding to a port).
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/", post(receive_webhook))
        .route("/health", get(health))
        .with_state(dispatcher)
}

/// Binds `addr` and serves webhooks until `shutdown` resolves.
pub async fn serve<F>(
    addr: SocketAddr,
    dispatcher: Dispatcher,
    shutdown: F,
) -> Result<(), ListenerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::Bind { addr, source })?;
    info!(%addr, "listening for backup webhooks");

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ListenerError::Serve)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[instrument(skip_all, fields(bytes = body.len()))]
async fn receive_webhook(
    State(dispatcher): State<Dispatcher>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), WebhookError> {
    let report = BackupReport::from_json(&body).inspect_err(|e| {
        warn!(error = %e, "unable to handle webhook");
    })?;

    // Dispatch on its own task so a caller hanging up cannot cancel a
    // reconciliation half way through its retirements.
    let outcome: DispatchOutcome = tokio::spawn(async move { dispatcher.handle(report).await })
        .await
        .inspect_err(|e| error!(error = %e, "dispatch task failed"))??;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "outcome": outcome })),
    ))
}
