use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    clients::transport::Transport,
    engine::DispatchEngine,
    models::{
        device::Device,
        dispatch::DispatchResult,
        health::{HealthCheckResponse, HealthStatus},
        payload::NotificationRequest,
        response::ApiResponse,
    },
};

pub struct AppState<T> {
    engine: DispatchEngine<T>,
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub request: Option<NotificationRequest>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

pub fn router<T>(engine: DispatchEngine<T>) -> Router
where
    T: Transport + 'static,
{
    let state = Arc::new(AppState { engine });

    Router::new()
        .route("/health", get(health_check::<T>))
        .route("/push", post(push::<T>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server<T>(
    engine: DispatchEngine<T>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>>
where
    T: Transport + 'static,
{
    let app = router(engine);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Dispatch server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check<T>(State(state): State<Arc<AppState<T>>>) -> impl IntoResponse
where
    T: Transport + 'static,
{
    Json(HealthCheckResponse {
        status: HealthStatus::Healthy,
        timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        max_registration_tokens: state.engine.config().max_registration_tokens,
    })
}

async fn push<T>(
    State(state): State<Arc<AppState<T>>>,
    Json(body): Json<PushRequest>,
) -> (StatusCode, Json<ApiResponse<Vec<DispatchResult>>>)
where
    T: Transport + 'static,
{
    let request = body.request.unwrap_or_default();

    match state.engine.send(&request, &body.devices).await {
        Ok(results) => {
            let message = format!("{} of {} devices processed", results.len(), body.devices.len());
            (StatusCode::OK, Json(ApiResponse::success(results, message)))
        }
        Err(e) => {
            warn!(error = %e, "Push dispatch rejected");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse::error(
                    e.to_string(),
                    "Push dispatch failed".to_string(),
                )),
            )
        }
    }
}
