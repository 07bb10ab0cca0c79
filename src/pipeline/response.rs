//! Transport-independent response value.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::config::CorsConfig;
use crate::security::rate_limit::RateLimitDecision;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const X_RATELIMIT_WINDOW: &str = "x-ratelimit-window";

/// A terminal response produced by the pipeline.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn json(status: StatusCode, payload: &Value) -> Self {
        Self::raw_json(status, payload.to_string())
    }

    /// JSON that is already serialized, e.g. a cached payload.
    pub fn raw_json(status: StatusCode, payload: impl Into<Bytes>) -> Self {
        let mut response = Self::empty(status);
        response.body = payload.into();
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    /// `{"error": kind, "message": message}`.
    pub fn error(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self::json(status, &json!({ "error": kind, "message": message.into() }))
    }

    /// Generic 500 that reveals nothing about the failure.
    pub fn internal_error() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            "An unexpected error occurred",
        )
    }

    pub fn payload_size(&self) -> usize {
        self.body.len()
    }

    /// Parsed body, for tests and tooling.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_header(&mut self, name: &'static str, value: impl ToString) {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
    }

    pub fn set_header_name(&mut self, name: HeaderName, value: impl ToString) {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            self.headers.insert(name, value);
        }
    }

    /// `X-RateLimit-*` headers from an admission decision.
    pub fn apply_rate_limit(&mut self, decision: &RateLimitDecision) {
        self.set_header(X_RATELIMIT_LIMIT, decision.limit);
        self.set_header(X_RATELIMIT_REMAINING, decision.remaining);
        self.set_header(X_RATELIMIT_RESET, decision.reset_at);
        self.set_header(X_RATELIMIT_WINDOW, decision.window_secs);
    }

    /// CORS headers for an allowed origin.
    pub fn apply_cors(&mut self, cors: &CorsConfig, origin: Option<&str>) {
        let Some(origin) = origin else {
            return;
        };
        let any = cors.allowed_origins.iter().any(|o| o == "*");
        if any {
            self.set_header_name(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*");
        } else if cors.allowed_origins.iter().any(|o| o == origin) {
            self.set_header_name(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            self.set_header_name(header::VARY, "Origin");
        }
    }

    /// 204 answer to a CORS preflight probe.
    pub fn preflight(cors: &CorsConfig) -> Self {
        let mut response = Self::empty(StatusCode::NO_CONTENT);
        response.set_header_name(header::ACCESS_CONTROL_ALLOW_METHODS, &cors.allowed_methods);
        response.set_header_name(header::ACCESS_CONTROL_ALLOW_HEADERS, &cors.allowed_headers);
        response.set_header_name(header::ACCESS_CONTROL_MAX_AGE, cors.max_age_secs);
        response
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
