//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline (every terminal path, once):
//!     → logging.rs (RequestObserver → structured access event)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{CacheStatus, RequestObserver, RequestRecord, TracingObserver};
