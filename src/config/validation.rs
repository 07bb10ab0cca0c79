//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (users reference existing roles)
//! - Validate value ranges (windows and TTLs > 0, addresses parse)
//! - Reject table names the gateway would refuse at request time
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::data::is_valid_identifier;
use crate::security::rbac::WILDCARD;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,

    #[error("rate_limit.window_seconds must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.sweep_max_age_secs ({max_age}) must be at least window_seconds ({window})")]
    SweepShorterThanWindow { max_age: u64, window: u64 },

    #[error("cache TTL for {scope} must be greater than zero")]
    ZeroCacheTtl { scope: String },

    #[error("invalid table name in {field}: {name:?}")]
    InvalidTableName { field: &'static str, name: String },

    #[error("user {user} references unknown role {role}")]
    UnknownRole { user: String, role: String },

    #[error("an API key is mapped to user {user}, who has no role")]
    KeyWithoutRole { user: String },

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    EmptyAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::EmptyAdminKey);
        }
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests);
    }
    if config.rate_limit.window_seconds == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    // A shorter sweep age would drop live windows and reset quotas early.
    if config.rate_limit.sweep_max_age_secs < config.rate_limit.window_seconds {
        errors.push(ValidationError::SweepShorterThanWindow {
            max_age: config.rate_limit.sweep_max_age_secs,
            window: config.rate_limit.window_seconds,
        });
    }

    if config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::ZeroCacheTtl {
            scope: "default".to_string(),
        });
    }
    for (table, ttl) in &config.cache.table_ttl {
        check_table(&mut errors, "cache.table_ttl", table);
        if *ttl == 0 {
            errors.push(ValidationError::ZeroCacheTtl {
                scope: table.clone(),
            });
        }
    }
    for table in &config.cache.excluded_tables {
        check_table(&mut errors, "cache.excluded_tables", table);
    }
    for table in &config.data.tables {
        check_table(&mut errors, "data.tables", table);
    }

    for tables in config.roles.values() {
        for table in tables.keys().filter(|t| t.as_str() != WILDCARD) {
            check_table(&mut errors, "roles", table);
        }
    }

    for (user, role) in &config.auth.users {
        if !config.roles.contains_key(role) {
            errors.push(ValidationError::UnknownRole {
                user: user.clone(),
                role: role.clone(),
            });
        }
    }
    for user in config.auth.api_keys.values() {
        if !config.auth.users.contains_key(user) {
            errors.push(ValidationError::KeyWithoutRole { user: user.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_table(errors: &mut Vec<ValidationError>, field: &'static str, name: &str) {
    if !is_valid_identifier(name) {
        errors.push(ValidationError::InvalidTableName {
            field,
            name: name.to_string(),
        });
    }
}
