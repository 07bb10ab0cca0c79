//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (sliding window per identifier)
//!     → auth.rs (resolve principal through the Authenticator)
//!     → rbac.rs (role × table × action decision)
//!     → Pass to handler dispatch
//! ```
//!
//! # Design Decisions
//! - Identifiers and API keys are hashed before they reach storage
//! - Authorization fails closed: unknown roles and missing entries deny
//! - Rate limiting fails open on storage errors (availability first)

pub mod auth;
pub mod digest;
pub mod rate_limit;
pub mod rbac;

pub use auth::{Authenticator, Principal, StaticAuthenticator};
pub use rate_limit::{
    FileRateLimitStore, MemoryRateLimitStore, RateLimitDecision, RateLimitStore, RateLimiter,
};
pub use rbac::Rbac;
