use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde::Serialize;

use super::api::{api_router, with_hub};
use super::auth::PRINCIPAL_HEADER;
use super::response::{ApiError, ApiResponse};
use crate::hub::Hub;

pub struct AppState {
    pub hub: Hub,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    namespaces: usize,
}

/// Readiness: answers only once the catalog can be read.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let namespaces = with_hub(&state, |hub| hub.list_namespaces()).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(Health {
        status: "ok",
        namespaces: namespaces.len(),
    })))
}

/// One line per request. The caller is logged by name, never the body.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let principal = request
        .headers()
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        %principal,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request"
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
