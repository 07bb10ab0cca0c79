//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → role tables, limits and TTLs injected into each subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; role tables never change per request
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, CacheConfig, CacheDriver, CorsConfig, DataConfig, GatewayConfig,
    ListenerConfig, ObservabilityConfig, PluginConfig, RateLimitConfig, RateLimitStorage,
    RoleConfig, SecurityConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
