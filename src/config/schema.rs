//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Role table: role → (table or `*`) → allowed actions.
pub type RoleConfig = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Sliding-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Response caching.
    pub cache: CacheConfig,

    /// Static credential sources.
    pub auth: AuthConfig,

    /// Role-based permissions.
    pub roles: RoleConfig,

    /// Plugin selection.
    pub plugins: PluginConfig,

    /// Cross-origin resource sharing.
    pub cors: CorsConfig,

    /// Tables served by the bundled in-memory data source.
    pub data: DataConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Where rate-limit windows are persisted.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitStorage {
    #[default]
    Memory,
    File,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum admitted requests per identifier inside one window.
    pub max_requests: u32,

    /// Sliding window length in seconds.
    pub window_seconds: u64,

    /// Storage backend for request windows.
    pub storage: RateLimitStorage,

    /// Directory used by the file storage backend.
    pub storage_path: String,

    /// How often the maintenance sweep runs.
    pub sweep_interval_secs: u64,

    /// Records untouched for longer than this are removed by the sweep.
    pub sweep_max_age_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_seconds: 60,
            storage: RateLimitStorage::Memory,
            storage_path: "storage/rate_limits".to_string(),
            sweep_interval_secs: 300,
            sweep_max_age_secs: 3600,
        }
    }
}

impl RateLimitConfig {
    /// Age after which the sweep may drop a record. Never shorter than the
    /// window, so a record still holding live timestamps survives.
    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(self.sweep_max_age_secs.max(self.window_seconds))
    }
}

/// Cache storage driver.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheDriver {
    #[default]
    Memory,
    File,
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    pub driver: CacheDriver,

    /// Directory used by the file driver.
    pub path: String,

    /// TTL applied when a table has no override.
    pub default_ttl_secs: u64,

    /// Per-table TTL overrides.
    pub table_ttl: BTreeMap<String, u64>,

    /// Tables that never participate in caching.
    pub excluded_tables: Vec<String>,

    /// Prefix of every cache key.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: CacheDriver::Memory,
            path: "storage/cache".to_string(),
            default_ttl_secs: 300,
            table_ttl: BTreeMap::new(),
            excluded_tables: Vec::new(),
            key_prefix: "tablegate".to_string(),
        }
    }
}

/// Static credential sources used by the bundled authenticator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// API key → username.
    pub api_keys: BTreeMap<String, String>,

    /// Username → role.
    pub users: BTreeMap<String, String>,

    /// Username → hex SHA-256 digest of the password, used by `login`.
    pub passwords: BTreeMap<String, String>,

    /// Lifetime of session tokens issued by `login`.
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: BTreeMap::new(),
            users: BTreeMap::new(),
            passwords: BTreeMap::new(),
            session_ttl_secs: 3600,
        }
    }
}

/// Plugin selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PluginConfig {
    /// Plugins to load. `None` loads every registered plugin.
    pub enabled: Option<Vec<String>>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin.
    pub allowed_origins: Vec<String>,

    pub allowed_methods: String,

    pub allowed_headers: String,

    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
            allowed_headers: "Content-Type, Authorization, X-API-Key, X-Request-Id".to_string(),
            max_age_secs: 86_400,
        }
    }
}

/// Tables created in the in-memory data source at startup.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DataConfig {
    pub tables: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
