use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::CacheStats;
use crate::http::server::AppState;
use crate::lifecycle::SweepReport;
use crate::plugins::{PermissionGrants, PluginInfo};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub actions: Vec<String>,
    pub tables: Vec<String>,
    pub rate_limit: RateLimitStatus,
    pub active_sessions: usize,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Serialize)]
pub struct PluginStatus {
    pub boot_order: Vec<String>,
    pub plugins: Vec<PluginInfo>,
    pub grants: PermissionGrants,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let gateway = &state.gateway;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: gateway.uptime_secs(),
        actions: gateway
            .pipeline
            .action_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        tables: gateway.data.tables(),
        rate_limit: RateLimitStatus {
            enabled: gateway.limiter.is_enabled(),
            max_requests: gateway.limiter.max_requests(),
            window_secs: gateway.limiter.window_secs(),
        },
        active_sessions: gateway.authenticator.active_sessions(),
    })
}

pub async fn get_plugins(State(state): State<AppState>) -> Json<PluginStatus> {
    let plugins = &state.gateway.plugins;
    Json(PluginStatus {
        boot_order: plugins.boot_order().into_iter().map(str::to_string).collect(),
        plugins: plugins.describe(),
        grants: plugins.grants().clone(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.gateway.cache.stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.gateway.cache.clear();
    tracing::info!(cleared, "Cache cleared through admin API");
    Json(json!({ "cleared": cleared }))
}

pub async fn sweep_rate_limits(State(state): State<AppState>) -> Json<SweepReport> {
    let gateway = &state.gateway;
    let max_age = gateway.config.rate_limit.sweep_max_age();
    let limiter = gateway.limiter.clone();
    let removed = tokio::task::spawn_blocking(move || limiter.sweep(max_age))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Rate limit sweep panicked");
            0
        });
    Json(SweepReport {
        rate_limit_records: removed,
        ..SweepReport::default()
    })
}
