//! HTTP receiver for OneBot event reports (HTTP POST mode).

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::types::BotEvent;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::event::parse_event;
use crate::signature;

/// Largest report body read for signature checks.
const MAX_REPORT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone)]
struct ReceiverState {
    events: mpsc::Sender<BotEvent>,
    access_token: Option<String>,
    secret: Option<String>,
    self_id: String,
}

/// Bearer token check: `Authorization: Bearer <token>` or `?access_token=`.
async fn require_token(
    State(state): State<Arc<ReceiverState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.access_token else {
        return next.run(req).await;
    };

    let from_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|t| t == expected);
    let from_query = req.uri().query().is_some_and(|q| {
        q.split('&')
            .filter_map(|pair| pair.strip_prefix("access_token="))
            .any(|t| t == expected)
    });
    if from_header || from_query {
        return next.run(req).await;
    }

    tracing::warn!("Rejected event report with a missing or wrong access token");
    StatusCode::UNAUTHORIZED.into_response()
}

/// `X-Signature: sha1=<hex>` check over the raw body when a secret is set.
async fn require_signature(
    State(state): State<Arc<ReceiverState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(secret) = &state.secret else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_REPORT_BYTES).await else {
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    };
    let valid = parts
        .headers
        .get("X-Signature")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|sig| signature::verify(secret, &bytes, sig));
    if !valid {
        tracing::warn!("Rejected event report with a missing or wrong signature");
        return StatusCode::FORBIDDEN.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn receive_event(
    State(state): State<Arc<ReceiverState>>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let Some(event) = parse_event(&body, &state.self_id) else {
        return StatusCode::NO_CONTENT;
    };
    if state.events.send(event).await.is_err() {
        tracing::warn!("Event dropped: handler loop is gone");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::NO_CONTENT
}

/// Router accepting event reports on `POST /`.
///
/// Empty `access_token` or `secret` values disable the matching check.
pub fn build_router(
    events: mpsc::Sender<BotEvent>,
    access_token: Option<String>,
    secret: Option<String>,
    self_id: &str,
) -> Router {
    let state = Arc::new(ReceiverState {
        events,
        access_token: access_token.filter(|t| !t.is_empty()),
        secret: secret.filter(|s| !s.is_empty()),
        self_id: self_id.to_string(),
    });
    Router::new()
        .route("/", post(receive_event))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_signature,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listen` until `shutdown` resolves.
pub async fn serve(
    listen: &str,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| PokebotError::Config(format!("cannot listen on {listen}: {e}")))?;
    tracing::info!("Event receiver listening on http://{listen}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
