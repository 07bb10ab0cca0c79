//! The request pipeline.
//!
//! # Stage Order
//! ```text
//! preflight → admission → action resolution → method/table checks
//!     → authentication → authorization → table existence → before hooks
//!     → cache lookup → dispatch → after hooks → cache populate/invalidate
//!     → finalize (request id, rate headers, CORS) → observer
//! ```
//!
//! # Design Decisions
//! - Every stage returns `Result<_, ActionError>`; the first error ends the
//!   request
//! - Faults and panics are caught once here and become a bare 500
//! - The observer runs exactly once per request, whatever the outcome

use axum::http::{Method, StatusCode};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::action::{ActionContext, ActionHandler, ActionKind};
use super::builtin::BuiltinAction;
use super::context::PipelineContext;
use super::request::ApiRequest;
use super::response::{ApiResponse, X_REQUEST_ID};
use crate::cache::CacheManager;
use crate::config::CorsConfig;
use crate::data::{is_valid_identifier, DataSource};
use crate::error::{ActionError, ApiError, ForbiddenReason};
use crate::observability::{metrics, CacheStatus, RequestObserver, TracingObserver};
use crate::plugins::{HookContext, PluginManager};
use crate::security::auth::{Authenticator, Principal};
use crate::security::digest::sha256_hex;
use crate::security::rate_limit::RateLimiter;
use crate::security::rbac::{Rbac, WILDCARD};

/// Parameters that never take part in cache keys.
const UNCACHED_PARAMS: &[&str] = &["api_key"];

/// Collaborators the pipeline is assembled from.
pub struct PipelineParts {
    pub limiter: Arc<RateLimiter>,
    /// Configured roles already merged with plugin grants.
    pub rbac: Rbac,
    pub cache: Arc<CacheManager>,
    pub plugins: Arc<PluginManager>,
    pub data: Arc<dyn DataSource>,
    pub authenticator: Arc<dyn Authenticator>,
    pub cors: CorsConfig,
}

pub struct Pipeline {
    limiter: Arc<RateLimiter>,
    rbac: Rbac,
    cache: Arc<CacheManager>,
    plugins: Arc<PluginManager>,
    data: Arc<dyn DataSource>,
    authenticator: Arc<dyn Authenticator>,
    cors: CorsConfig,
    actions: BTreeMap<String, Arc<dyn ActionHandler>>,
    observer: Arc<dyn RequestObserver>,
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> Self {
        let mut actions: BTreeMap<String, Arc<dyn ActionHandler>> = BuiltinAction::ALL
            .into_iter()
            .map(|action| {
                let handler: Arc<dyn ActionHandler> = Arc::new(action);
                (action.name().to_string(), handler)
            })
            .collect();
        for (name, handler) in parts.plugins.actions() {
            actions.insert(name.to_string(), handler.clone());
        }

        Self {
            limiter: parts.limiter,
            rbac: parts.rbac,
            cache: parts.cache,
            plugins: parts.plugins,
            data: parts.data,
            authenticator: parts.authenticator,
            cors: parts.cors,
            actions,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default tracing observer.
    pub fn with_observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Run one request to completion. Always produces exactly one response
    /// and one observer call.
    pub fn execute(&self, request: ApiRequest) -> ApiResponse {
        let mut ctx = PipelineContext::new(&request);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(&request, &mut ctx)));

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => self.respond(&ctx, err),
            Err(payload) => self.respond_fault(&ctx, &panic_message(payload.as_ref())),
        };
        self.complete(&request, &ctx, response)
    }

    /// Terminate a request the transport could not hand over intact (oversized
    /// body, lost worker). Still produces one observer call.
    pub fn reject(&self, request: &ApiRequest, err: ActionError) -> ApiResponse {
        let ctx = PipelineContext::new(request);
        let response = self.respond(&ctx, err);
        self.complete(request, &ctx, response)
    }

    fn respond(&self, ctx: &PipelineContext, err: ActionError) -> ApiResponse {
        match err {
            ActionError::Rejected(err) => self.respond_error(ctx, err),
            ActionError::Fault(detail) => self.respond_fault(ctx, &detail),
        }
    }

    fn complete(&self, request: &ApiRequest, ctx: &PipelineContext, mut response: ApiResponse) -> ApiResponse {
        self.finalize(request, ctx, &mut response);
        self.observer
            .on_response(&ctx.record(response.status, response.payload_size()));
        response
    }

    /// Response for an expected terminal state.
    pub fn respond_error(&self, ctx: &PipelineContext, err: ApiError) -> ApiResponse {
        tracing::debug!(
            request_id = %ctx.request_id,
            status = err.status().as_u16(),
            error = %err,
            "Request rejected"
        );
        err.into_response()
    }

    /// Generic 500; the detail only reaches the log.
    pub fn respond_fault(&self, ctx: &PipelineContext, detail: &str) -> ApiResponse {
        tracing::error!(
            request_id = %ctx.request_id,
            action = ctx.action.as_deref().unwrap_or("-"),
            table = ctx.table.as_deref().unwrap_or("-"),
            detail,
            "Request failed"
        );
        ApiResponse::internal_error()
    }

    fn run(&self, request: &ApiRequest, ctx: &mut PipelineContext) -> Result<ApiResponse, ActionError> {
        if request.is_preflight() {
            return Ok(ApiResponse::preflight(&self.cors));
        }

        self.admit(request, ctx)?;

        let action = request
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ApiError::InvalidAction(String::new()))?;
        let handler = self
            .actions
            .get(action)
            .ok_or_else(|| ApiError::InvalidAction(action.to_string()))?;
        let kind = handler.kind();

        if kind.is_mutating() && !is_write_method(&request.method) {
            return Err(ApiError::MethodNotAllowed {
                action: action.to_string(),
                method: request.method.to_string(),
            }
            .into());
        }

        let table = if kind.requires_table() {
            Some(self.validate_table(request, action)?)
        } else {
            None
        };

        let principal = if kind.requires_auth() {
            Some(self.authenticate(request, ctx)?)
        } else {
            None
        };
        if let Some(principal) = &principal {
            self.authorize(principal, table.unwrap_or(WILDCARD), action, ctx)?;
        }

        if let Some(table) = table {
            if !self.data.has_table(table) {
                return Err(ApiError::NotFound(format!("Table '{table}' does not exist")).into());
            }
        }

        let hook_ctx = HookContext {
            action,
            kind,
            table,
            principal: principal.as_ref(),
            request,
        };
        self.plugins.hooks().run_before(&hook_ctx)?;

        let cache_key = self.cache_key(request, table, action, kind, ctx.role());
        if let Some(key) = &cache_key {
            if let Some(payload) = self.cache.lookup(key) {
                ctx.cache = CacheStatus::Hit;
                return Ok(ApiResponse::raw_json(StatusCode::OK, payload));
            }
            ctx.cache = CacheStatus::Miss;
        }

        let action_ctx = ActionContext {
            request,
            action,
            table,
            principal: principal.as_ref(),
            data: self.data.as_ref(),
            authenticator: self.authenticator.as_ref(),
        };
        let mut payload = handler.handle(&action_ctx)?;
        self.plugins.hooks().run_after(&hook_ctx, &mut payload);

        let body = payload.to_string();
        if let (Some(key), Some(table)) = (&cache_key, table) {
            self.cache.store(key, table, &body);
        }
        if let (true, Some(table)) = (kind.is_mutating(), table) {
            self.cache.invalidate_table(table);
        }
        Ok(ApiResponse::raw_json(StatusCode::OK, body))
    }

    fn admit(&self, request: &ApiRequest, ctx: &mut PipelineContext) -> Result<(), ApiError> {
        let identifier = self.identifier(request);
        ctx.identifier = Some(identifier.clone());
        if !self.limiter.is_enabled() {
            return Ok(());
        }

        let decision = self.limiter.check_limit(&identifier, None, None);
        ctx.decision = Some(decision.clone());
        if decision.allowed {
            return Ok(());
        }

        metrics::record_rate_limited();
        tracing::warn!(
            request_id = %ctx.request_id,
            identifier = %identifier,
            limit = decision.limit,
            retry_after = decision.reset_after_secs,
            "Rate limit exceeded"
        );
        Err(ApiError::RateLimited(decision))
    }

    /// `user:<id>`, else `key:<sha256>`, else `ip:<addr>`, else `anonymous`.
    fn identifier(&self, request: &ApiRequest) -> String {
        if let Some(user) = self.authenticator.identify(request) {
            return format!("user:{user}");
        }
        if let Some(key) = request.api_key() {
            return format!("key:{}", sha256_hex(key));
        }
        if let Some(ip) = request.client_ip() {
            return format!("ip:{ip}");
        }
        "anonymous".to_string()
    }

    fn validate_table<'r>(&self, request: &'r ApiRequest, action: &str) -> Result<&'r str, ApiError> {
        let table = request
            .table
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("Action '{action}' requires a table")))?;
        if !is_valid_identifier(table) {
            return Err(ApiError::BadRequest(format!("Invalid table name '{table}'")));
        }
        Ok(table)
    }

    fn authenticate(&self, request: &ApiRequest, ctx: &mut PipelineContext) -> Result<Principal, ApiError> {
        match self.authenticator.authenticate(request) {
            Ok(principal) => {
                ctx.principal = Some(principal.clone());
                Ok(principal)
            }
            Err(response) => {
                metrics::record_security_event("unauthenticated");
                tracing::warn!(
                    target: "security",
                    request_id = %ctx.request_id,
                    identifier = ctx.identifier.as_deref().unwrap_or("-"),
                    action = ctx.action.as_deref().unwrap_or("-"),
                    "Authentication failed"
                );
                Err(ApiError::Unauthenticated(Box::new(response)))
            }
        }
    }

    fn authorize(
        &self,
        principal: &Principal,
        table: &str,
        action: &str,
        ctx: &PipelineContext,
    ) -> Result<(), ApiError> {
        let Some(role) = principal.role.as_deref().filter(|r| self.rbac.role_exists(r)) else {
            metrics::record_security_event("no_role");
            tracing::warn!(target: "security", request_id = %ctx.request_id, user = %principal.user, "No role assigned");
            return Err(ApiError::Forbidden(ForbiddenReason::NoRole));
        };
        if self.rbac.is_allowed(role, table, action) {
            return Ok(());
        }

        metrics::record_security_event("forbidden");
        tracing::warn!(
            target: "security",
            request_id = %ctx.request_id,
            user = %principal.user,
            role,
            table,
            action,
            "Permission denied"
        );
        Err(ApiError::Forbidden(ForbiddenReason::Denied {
            role: role.to_string(),
            table: table.to_string(),
            action: action.to_string(),
        }))
    }

    /// Key for cache-eligible reads; `None` bypasses the cache. The role is
    /// the variation so differently privileged callers never share entries.
    fn cache_key(
        &self,
        request: &ApiRequest,
        table: Option<&str>,
        action: &str,
        kind: ActionKind,
        role: Option<&str>,
    ) -> Option<String> {
        let table = table.filter(|t| kind.is_cacheable() && self.cache.applies_to(t))?;
        let params: BTreeMap<String, String> = request
            .params
            .iter()
            .filter(|(name, _)| !UNCACHED_PARAMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Some(self.cache.cache_key(table, action, &params, role))
    }

    fn finalize(&self, request: &ApiRequest, ctx: &PipelineContext, response: &mut ApiResponse) {
        response.set_header(X_REQUEST_ID, &ctx.request_id);
        if let Some(decision) = &ctx.decision {
            response.apply_rate_limit(decision);
        }
        response.apply_cors(&self.cors, request.origin());
    }
}

fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic".to_string()
    }
}
