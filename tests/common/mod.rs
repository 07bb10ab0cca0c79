//! Shared utilities for integration testing.
#![allow(dead_code)]

use axum::http::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tablegate::clock::ManualClock;
use tablegate::config::GatewayConfig;
use tablegate::observability::{CacheStatus, RequestObserver, RequestRecord};
use tablegate::pipeline::{ApiRequest, ApiResponse};
use tablegate::plugins::PluginRegistry;
use tablegate::security::digest::sha256_hex;
use tablegate::Gateway;

pub const ADMIN_KEY: &str = "admin-key";
pub const CLERK_KEY: &str = "clerk-key";
pub const ORPHAN_KEY: &str = "orphan-key";
pub const ADMIN_API_KEY: &str = "ops-secret";

/// Collects every record handed to the observer.
#[derive(Default)]
pub struct CountingObserver {
    records: Mutex<Vec<RequestRecord>>,
}

impl CountingObserver {
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn last(&self) -> RequestRecord {
        self.records.lock().unwrap().last().cloned().expect("no records")
    }

    pub fn cache_statuses(&self) -> Vec<CacheStatus> {
        self.records.lock().unwrap().iter().map(|r| r.cache).collect()
    }
}

impl RequestObserver for CountingObserver {
    fn on_response(&self, record: &RequestRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// A gateway on simulated time with a recording observer.
pub struct TestGateway {
    pub gateway: Arc<Gateway>,
    pub clock: Arc<ManualClock>,
    pub observer: Arc<CountingObserver>,
}

impl TestGateway {
    pub fn execute(&self, request: ApiRequest) -> ApiResponse {
        self.gateway.pipeline.execute(request)
    }
}

fn actions(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Tables `orders`, `users`, `secrets`; roles `admin` (everything) and
/// `clerk` (limited, with an explicit empty entry for `secrets`).
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.data.tables = actions(&["orders", "users", "secrets"]);

    config.rate_limit.max_requests = 1000;
    config.rate_limit.window_seconds = 60;

    config.auth.api_keys.insert(ADMIN_KEY.into(), "alice".into());
    config.auth.api_keys.insert(CLERK_KEY.into(), "bob".into());
    config.auth.api_keys.insert(ORPHAN_KEY.into(), "carol".into());
    config.auth.users.insert("alice".into(), "admin".into());
    config.auth.users.insert("bob".into(), "clerk".into());
    config.auth.passwords.insert("alice".into(), sha256_hex("wonderland"));

    let mut admin = BTreeMap::new();
    admin.insert(
        "*".to_string(),
        actions(&[
            "list", "count", "read", "create", "update", "delete", "bulk_create",
            "bulk_update", "bulk_delete", "tables",
        ]),
    );
    let mut clerk = BTreeMap::new();
    clerk.insert("*".to_string(), actions(&["list", "tables"]));
    clerk.insert("orders".to_string(), actions(&["list", "read", "create"]));
    clerk.insert("secrets".to_string(), Vec::new());
    config.roles.insert("admin".into(), admin);
    config.roles.insert("clerk".into(), clerk);

    config.admin.api_key = ADMIN_API_KEY.into();
    config
}

pub fn gateway_with(config: GatewayConfig, registry: &PluginRegistry) -> TestGateway {
    let clock = Arc::new(ManualClock::default());
    let observer = Arc::new(CountingObserver::default());
    let gateway = Gateway::build(config, clock.clone(), registry, observer.clone())
        .expect("gateway should start");
    TestGateway {
        gateway: Arc::new(gateway),
        clock,
        observer,
    }
}

pub fn gateway() -> TestGateway {
    gateway_with(test_config(), &PluginRegistry::with_builtin())
}

pub fn get(action: &str, table: &str, key: &str) -> ApiRequest {
    ApiRequest::new(Method::GET)
        .with_action(action)
        .with_table(table)
        .with_header("X-API-Key", key)
}

pub fn post(action: &str, table: &str, key: &str, body: &Value) -> ApiRequest {
    ApiRequest::new(Method::POST)
        .with_action(action)
        .with_table(table)
        .with_header("X-API-Key", key)
        .with_json(body)
}
