//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, body limit)
//!     → request.rs (HTTP → ApiRequest)
//!     → pipeline (spawn_blocking)
//!     → ApiResponse → HTTP response
//! ```

pub mod request;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
