use crate::telemetry::format_error_chain;
use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use mintwatch_config::WebhookConfig;
use mintwatch_core_types::{EventEnvelope, ValidationResult};
use mintwatch_ingestion::decode_webhook_payload;
use mintwatch_market_data::ValidationError;
use mintwatch_signals::SignalService;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct WebRuntimeHandle {
    inner: Arc<WebRuntimeInner>,
}

struct WebRuntimeInner {
    service: Arc<SignalService>,
    auth_header: String,
    max_body_bytes: usize,
    started_at: DateTime<Utc>,
}

impl WebRuntimeHandle {
    pub fn new(service: Arc<SignalService>, config: &WebhookConfig) -> Self {
        Self {
            inner: Arc::new(WebRuntimeInner {
                service,
                auth_header: config.auth_header.trim().to_string(),
                max_body_bytes: config.max_body_bytes.max(1),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn auth_is_configured(&self) -> bool {
        !self.inner.auth_header.is_empty()
    }

    pub async fn run_server(
        self,
        config: WebhookConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let app = build_router(self);
        let bind = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("failed to bind webhook server on {}", bind))?;
        info!(bind = %bind, "webhook server started");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            })
            .await
            .context("axum webhook server failed")?;
        Ok(())
    }
}

pub(crate) fn build_router(state: WebRuntimeHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);
    let body_limit = DefaultBodyLimit::max(state.inner.max_body_bytes);
    Router::new()
        .route("/webhook", post(webhook))
        .route("/healthz", get(healthz))
        .route("/test/:mint", get(test_validation))
        .layer(body_limit)
        .layer(cors)
        .with_state(state)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn upstream(error: &ValidationError) -> Self {
        let status = if error.is_retryable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::BAD_GATEWAY
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "status": self.status.as_u16(),
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    ts: DateTime<Utc>,
    started_at: DateTime<Utc>,
    trigger_mode: &'static str,
    tracked_tokens: usize,
    volume_entries: usize,
    dedup_entries: usize,
}

fn ensure_authorized_request(
    state: &WebRuntimeHandle,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let expected = state.inner.auth_header.as_str();
    if expected.is_empty() {
        return Ok(());
    }
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    if provided == Some(expected) {
        return Ok(());
    }
    Err(ApiError::unauthorized("invalid authorization header"))
}

async fn webhook(
    State(state): State<WebRuntimeHandle>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    ensure_authorized_request(&state, &headers)?;
    let events = decode_webhook_payload(body.as_ref()).map_err(|error| {
        debug!(error = %error, bytes = body.len(), "rejected malformed webhook payload");
        ApiError::bad_request(error.to_string())
    })?;

    let envelope = EventEnvelope::new("webhook", events);
    let event_count = envelope.payload.len();
    let correlation_id = envelope.correlation_id;
    let service = Arc::clone(&state.inner.service);
    tokio::spawn(async move {
        if let Err(error) = service.handle_batch(&envelope.payload).await {
            warn!(
                correlation_id = %envelope.correlation_id,
                events = envelope.payload.len(),
                error = %format_error_chain(&error),
                "webhook batch finished with errors"
            );
        }
    });

    Ok(Json(json!({
        "status": "accepted",
        "events": event_count,
        "correlation_id": correlation_id,
    })))
}

async fn healthz(State(state): State<WebRuntimeHandle>) -> impl IntoResponse {
    let service = &state.inner.service;
    let stats = service.stats();
    Json(HealthResponse {
        status: "ok",
        ts: Utc::now(),
        started_at: state.inner.started_at,
        trigger_mode: service.trigger_mode().as_str(),
        tracked_tokens: stats.tracked_tokens,
        volume_entries: stats.volume_entries,
        dedup_entries: stats.dedup_entries,
    })
}

async fn test_validation(
    State(state): State<WebRuntimeHandle>,
    Path(mint): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ValidationResult>, ApiError> {
    ensure_authorized_request(&state, &headers)?;
    let mint = mint.trim();
    if mint.is_empty() {
        return Err(ApiError::bad_request("mint is required"));
    }
    let result = state
        .inner
        .service
        .validator()
        .validate(mint)
        .await
        .map_err(|error| ApiError::upstream(&error))?;
    Ok(Json(result))
}
