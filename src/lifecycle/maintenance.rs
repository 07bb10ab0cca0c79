//! Periodic housekeeping.
//!
//! # Responsibilities
//! - Sweep rate-limit records untouched for longer than the configured age
//! - Purge expired cache entries
//! - Drop expired login sessions

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::cache::CacheManager;
use crate::config::RateLimitConfig;
use crate::security::{RateLimiter, StaticAuthenticator};

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub rate_limit_records: usize,
    pub cache_entries: usize,
    pub sessions: usize,
}

#[derive(Clone)]
pub struct MaintenanceTask {
    limiter: Arc<RateLimiter>,
    cache: Arc<CacheManager>,
    authenticator: Arc<StaticAuthenticator>,
    interval: Duration,
    max_age: Duration,
}

impl MaintenanceTask {
    pub fn new(
        limiter: Arc<RateLimiter>,
        cache: Arc<CacheManager>,
        authenticator: Arc<StaticAuthenticator>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            limiter,
            cache,
            authenticator,
            interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            max_age: config.sweep_max_age(),
        }
    }

    pub fn run_once(&self) -> SweepReport {
        SweepReport {
            rate_limit_records: self.limiter.sweep(self.max_age),
            cache_entries: self.cache.purge_expired(),
            sessions: self.authenticator.purge_expired_sessions(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Maintenance task starting"
        );

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let task = self.clone();
                    match tokio::task::spawn_blocking(move || task.run_once()).await {
                        Ok(report) => tracing::debug!(?report, "Maintenance sweep finished"),
                        Err(e) => tracing::error!(error = %e, "Maintenance sweep panicked"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Maintenance task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
