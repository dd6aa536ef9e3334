//! HTTP view of the canonical state, plus health and Prometheus metrics

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::json;
use state_lib::ingest::SubscriptionStatus;
use state_lib::{ActionEnvelope, ContainerId, HostBus, StateStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub subscription: SubscriptionStatus,
    pub bus: HostBus,
    pub action_channel: String,
    pub started_at: DateTime<Utc>,
}

impl ApiState {
    pub fn new(
        store: StateStore,
        subscription: SubscriptionStatus,
        bus: HostBus,
        action_channel: impl Into<String>,
    ) -> Self {
        Self {
            store,
            subscription,
            bus,
            action_channel: action_channel.into(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    subscribed: bool,
    active_containers: usize,
    started_at: DateTime<Utc>,
}

/// Full canonical state
async fn state(State(api): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(api.store.current())
}

/// One container, addressed by token or display name
async fn container(
    State(api): State<Arc<ApiState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let record = ContainerId::from_wire(&name)
        .and_then(|id| api.store.read(|s| s.container(id).cloned()));

    match record {
        Some(record) => (StatusCode::OK, Json(json!(record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown container '{}'", name) })),
        ),
    }
}

/// 200 while the adapter is subscribed, 503 once the subscription ended
async fn healthz(State(api): State<Arc<ApiState>>) -> impl IntoResponse {
    let health = HealthResponse {
        subscribed: api.subscription.is_active(),
        active_containers: api.store.read(|s| s.active_count()),
        started_at: api.started_at,
    };

    let status_code = if health.subscribed {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Publish an action for the host
async fn send_action(
    State(api): State<Arc<ApiState>>,
    Json(envelope): Json<ActionEnvelope>,
) -> impl IntoResponse {
    let name = envelope.action.name();

    match api.bus.send_action(&api.action_channel, envelope.action) {
        Ok(delivered) => {
            info!(action = name, delivered, "Action published");
            (StatusCode::ACCEPTED, Json(json!({ "delivered": delivered })))
        }
        Err(e) => {
            warn!(action = name, error = %e, "Failed to publish action");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/state", get(self::state))
        .route("/containers/:id", get(container))
        .route("/healthz", get(healthz))
        .route("/actions", post(send_action))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<ApiState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
