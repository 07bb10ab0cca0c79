//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router for the public API
//! - Wire up middleware (tracing, timeout, request id)
//! - Read bodies under the configured limit
//! - Run the synchronous pipeline off the async workers
//! - Bind, serve, and stop on the shutdown broadcast

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::error::{ActionError, ApiError};
use crate::http::request::{from_parts, RouteTarget};
use crate::lifecycle::{shutdown, Gateway};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// HTTP server for the public API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            router: build_router(AppState { gateway }),
        }
    }

    /// Run until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.gateway.config.timeouts.request_secs);
    Router::new()
        .route("/health", get(health))
        .route("/api", any(api_handler))
        .route("/api/{table}/{action}", any(table_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_secs": state.gateway.uptime_secs(),
        })),
    )
}

/// `ANY /api?action=..&table=..`
async fn api_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    dispatch(state, request, None).await
}

/// `ANY /api/{table}/{action}`
async fn table_handler(
    State(state): State<AppState>,
    Path((table, action)): Path<(String, String)>,
    request: Request<Body>,
) -> Response {
    dispatch(state, request, Some(RouteTarget { table, action })).await
}

async fn dispatch(state: AppState, request: Request<Body>, target: Option<RouteTarget>) -> Response {
    let (parts, body) = request.into_parts();
    let mut api_request = from_parts(&parts, target);
    let pipeline = state.gateway.pipeline.clone();

    let limit = state.gateway.config.security.max_body_size;
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => api_request.body = bytes,
        Err(e) => {
            tracing::debug!(request_id = %api_request.request_id, error = %e, "Request body rejected");
            return pipeline
                .reject(&api_request, ApiError::PayloadTooLarge.into())
                .into_response();
        }
    }

    let fallback = api_request.clone();
    let worker = pipeline.clone();
    match tokio::task::spawn_blocking(move || worker.execute(api_request)).await {
        Ok(response) => response.into_response(),
        Err(e) => pipeline
            .reject(&fallback, ActionError::Fault(format!("pipeline worker failed: {e}")))
            .into_response(),
    }
}
