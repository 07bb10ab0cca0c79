//! Per-request execution pipeline.
//!
//! # Data Flow
//! ```text
//! http/request.rs (HTTP → ApiRequest)
//!     → executor.rs (stages, fail-fast)
//!         → security (rate limit, authenticate, rbac)
//!         → plugins (before hooks)
//!         → cache (lookup)
//!         → action.rs / builtin.rs (dispatch to the data layer)
//!         → plugins (after hooks), cache (populate/invalidate)
//!     → response.rs (ApiResponse → HTTP)
//! ```

pub mod action;
pub mod builtin;
pub mod context;
pub mod executor;
pub mod request;
pub mod response;

pub use action::{ActionContext, ActionHandler, ActionKind};
pub use context::PipelineContext;
pub use executor::{Pipeline, PipelineParts};
pub use request::ApiRequest;
pub use response::ApiResponse;
