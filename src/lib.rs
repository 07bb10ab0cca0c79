//! tablegate: relational tables served as authenticated, rate-limited,
//! cached REST endpoints.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http (axum) ──▶ pipeline ──────────────────────────────┐
//!                                      │ preflight                            │
//!                                      │ admission ──────── security::rate_limit
//!                                      │ action resolution ─ pipeline::builtin + plugins
//!                                      │ authentication ─── security::auth
//!                                      │ authorization ──── security::rbac
//!                                      │ before hooks ───── plugins
//!                                      │ cache lookup ───── cache
//!                                      │ dispatch ───────── data
//!                                      │ after hooks, cache populate/invalidate
//!     Client Response                  ▼                                      │
//!     ◀────────────── ApiResponse ◀── finalize ◀── observability (once) ◀─────┘
//!
//!     Cross-cutting: config, lifecycle (startup, maintenance, shutdown), admin
//! ```

pub mod admin;
pub mod cache;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod persist;
pub mod pipeline;
pub mod plugins;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, Shutdown};
pub use pipeline::Pipeline;
