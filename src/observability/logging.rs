//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Define the per-request record and the single hook that receives it
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Access records go to the `access` target, auth failures to `security`

use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::metrics;

/// Initialize the global subscriber.
pub fn init_tracing(config: &ObservabilityConfig) {
    let default_filter = format!("tablegate={},tower_http=info", config.log_level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// How the cache took part in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    #[default]
    Bypass,
    Hit,
    Miss,
}

/// Everything recorded about one finished request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub request_id: String,
    pub method: String,
    pub action: Option<String>,
    pub table: Option<String>,
    pub identifier: Option<String>,
    pub user: Option<String>,
    pub status: u16,
    pub payload_size: usize,
    pub elapsed: Duration,
    pub cache: CacheStatus,
}

/// Receives exactly one record per request.
pub trait RequestObserver: Send + Sync {
    fn on_response(&self, record: &RequestRecord);
}

/// Writes the record as a structured event and updates metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RequestObserver for TracingObserver {
    fn on_response(&self, record: &RequestRecord) {
        let action = record.action.as_deref().unwrap_or("-");
        tracing::info!(
            target: "access",
            request_id = %record.request_id,
            method = %record.method,
            action,
            table = record.table.as_deref().unwrap_or("-"),
            identifier = record.identifier.as_deref().unwrap_or("-"),
            user = record.user.as_deref().unwrap_or("-"),
            status = record.status,
            payload_size = record.payload_size,
            elapsed_ms = record.elapsed.as_secs_f64() * 1000.0,
            cache = ?record.cache,
            "Request completed"
        );
        metrics::record_request(action, record.status, record.elapsed, record.payload_size);
    }
}
