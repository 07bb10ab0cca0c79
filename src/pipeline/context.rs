//! Per-request transient state.

use axum::http::StatusCode;
use std::time::Instant;

use crate::observability::{CacheStatus, RequestRecord};
use crate::pipeline::request::ApiRequest;
use crate::security::auth::Principal;
use crate::security::rate_limit::RateLimitDecision;

/// What the pipeline has learned about a request so far. Lives for one
/// request and is turned into a [`RequestRecord`] at the end.
#[derive(Debug)]
pub struct PipelineContext {
    pub request_id: String,
    pub method: String,
    pub action: Option<String>,
    pub table: Option<String>,
    pub identifier: Option<String>,
    pub principal: Option<Principal>,
    /// Set once admission has run with the limiter enabled.
    pub decision: Option<RateLimitDecision>,
    pub cache: CacheStatus,
    pub started: Instant,
}

impl PipelineContext {
    pub fn new(request: &ApiRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            method: request.method.to_string(),
            action: request.action.clone(),
            table: request.table.clone(),
            identifier: None,
            principal: None,
            decision: None,
            cache: CacheStatus::Bypass,
            started: Instant::now(),
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.principal.as_ref().and_then(|p| p.role.as_deref())
    }

    pub fn record(&self, status: StatusCode, payload_size: usize) -> RequestRecord {
        RequestRecord {
            request_id: self.request_id.clone(),
            method: self.method.clone(),
            action: self.action.clone(),
            table: self.table.clone(),
            identifier: self.identifier.clone(),
            user: self.principal.as_ref().map(|p| p.user.clone()),
            status: status.as_u16(),
            payload_size,
            elapsed: self.started.elapsed(),
            cache: self.cache,
        }
    }
}
