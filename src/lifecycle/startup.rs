//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into the shared gateway state
//! - Initialize subsystems in dependency order: stores, plugins, rbac,
//!   pipeline
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners are bound by the caller, after this succeeds

use std::io;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::cache::CacheManager;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, GatewayConfig};
use crate::data::{DataSource, MemoryDataSource};
use crate::observability::{RequestObserver, TracingObserver};
use crate::pipeline::{Pipeline, PipelineParts};
use crate::plugins::{PluginLoadError, PluginManager, PluginRegistry};
use crate::security::{RateLimiter, Rbac, StaticAuthenticator};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin error: {0}")]
    Plugins(#[from] PluginLoadError),

    #[error("storage error: {0}")]
    Storage(#[from] io::Error),
}

/// Everything a running gateway shares between listeners and tasks.
pub struct Gateway {
    pub config: GatewayConfig,
    pub clock: Arc<dyn Clock>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<CacheManager>,
    pub plugins: Arc<PluginManager>,
    pub authenticator: Arc<StaticAuthenticator>,
    pub data: Arc<dyn DataSource>,
    pub pipeline: Arc<Pipeline>,
    pub started_at: Instant,
}

impl Gateway {
    /// Production assembly: system clock and the bundled plugins.
    pub fn from_config(config: GatewayConfig) -> Result<Self, StartupError> {
        Self::build(
            config,
            Arc::new(SystemClock),
            &PluginRegistry::with_builtin(),
            Arc::new(TracingObserver),
        )
    }

    pub fn build(
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
        registry: &PluginRegistry,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<Self, StartupError> {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit, clock.clone())?);
        let cache = Arc::new(CacheManager::from_config(&config.cache, clock.clone())?);
        let plugins = Arc::new(PluginManager::load(registry, &config.plugins)?);
        let rbac = Rbac::new(&config.roles).with_grants(plugins.grants());
        let authenticator = Arc::new(StaticAuthenticator::new(&config.auth, clock.clone()));
        let data: Arc<dyn DataSource> =
            Arc::new(MemoryDataSource::with_tables(config.data.tables.iter().cloned()));

        let pipeline = Arc::new(Pipeline::new(PipelineParts {
            limiter: limiter.clone(),
            rbac,
            cache: cache.clone(),
            plugins: plugins.clone(),
            data: data.clone(),
            authenticator: authenticator.clone(),
            cors: config.cors.clone(),
        })
        .with_observer(observer));

        tracing::info!(
            tables = config.data.tables.len(),
            roles = config.roles.len(),
            plugins = ?plugins.boot_order(),
            rate_limit = limiter.is_enabled(),
            cache = cache.is_enabled(),
            "Gateway initialized"
        );

        Ok(Self {
            config,
            clock,
            limiter,
            cache,
            plugins,
            authenticator,
            data,
            pipeline,
            started_at: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
