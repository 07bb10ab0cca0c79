//! Plugin discovery, ordering and hooks as seen through a running gateway.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use tablegate::clock::ManualClock;
use tablegate::error::{ActionError, ApiError};
use tablegate::lifecycle::StartupError;
use tablegate::observability::TracingObserver;
use tablegate::pipeline::{ActionContext, ActionHandler, ActionKind, ApiRequest};
use tablegate::plugins::{Plugin, PluginLoadError, PluginRegistry, PluginResult, Registrar};
use tablegate::Gateway;

mod common;

use common::{get, post, ADMIN_KEY, CLERK_KEY};

type Log = Arc<Mutex<Vec<String>>>;

struct Named {
    name: &'static str,
    deps: Vec<String>,
    log: Log,
}

impl Plugin for Named {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn dependencies(&self) -> Vec<String> {
        self.deps.clone()
    }

    fn register(&self, _registrar: &mut Registrar) {
        self.log.lock().unwrap().push(format!("register:{}", self.name));
    }

    fn boot(&self) -> PluginResult {
        self.log.lock().unwrap().push(format!("boot:{}", self.name));
        Ok(())
    }
}

fn named(registry: &mut PluginRegistry, name: &'static str, deps: &[&str], log: &Log) {
    let deps: Vec<String> = deps.iter().map(|d| d.to_string()).collect();
    let log = log.clone();
    registry.register(move || {
        Box::new(Named {
            name,
            deps: deps.clone(),
            log: log.clone(),
        })
    });
}

#[test]
fn test_dependency_order_and_boot_after_register() {
    let log = Log::default();
    let mut registry = PluginRegistry::new();
    named(&mut registry, "c", &["b"], &log);
    named(&mut registry, "b", &["a"], &log);
    named(&mut registry, "a", &[], &log);

    let gw = common::gateway_with(common::test_config(), &registry);
    assert_eq!(gw.gateway.plugins.boot_order(), ["a", "b", "c"]);
    assert_eq!(
        *log.lock().unwrap(),
        ["register:a", "register:b", "register:c", "boot:a", "boot:b", "boot:c"]
    );
}

fn start(registry: &PluginRegistry) -> Result<Gateway, StartupError> {
    Gateway::build(
        common::test_config(),
        Arc::new(ManualClock::default()),
        registry,
        Arc::new(TracingObserver),
    )
}

#[test]
fn test_cycle_aborts_startup() {
    let log = Log::default();
    let mut registry = PluginRegistry::new();
    named(&mut registry, "a", &["b"], &log);
    named(&mut registry, "b", &["a"], &log);

    let err = start(&registry).err().unwrap();
    assert!(matches!(err, StartupError::Plugins(PluginLoadError::Cycle(_))));
    assert!(err.to_string().contains("a -> b -> a"));
}

#[test]
fn test_missing_dependency_aborts_startup() {
    let log = Log::default();
    let mut registry = PluginRegistry::new();
    named(&mut registry, "reports", &["ledger"], &log);

    let err = start(&registry).err().unwrap();
    let message = err.to_string();
    assert!(message.contains("reports") && message.contains("ledger"));
}

/// Freezes the `orders` table, tags list payloads, and lets clerks archive.
struct Guard;

struct Archive;

impl ActionHandler for Archive {
    fn kind(&self) -> ActionKind {
        ActionKind::Write
    }

    fn handle(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
        Ok(json!({ "archived": ctx.table }))
    }
}

impl Plugin for Guard {
    fn name(&self) -> &str {
        "guard"
    }

    fn version(&self) -> &str {
        "2.1.0"
    }

    fn register(&self, registrar: &mut Registrar) {
        registrar.on_before("delete", |ctx| match ctx.table {
            Some("orders") => Err(ApiError::BadRequest("orders are frozen".into())),
            _ => Ok(()),
        });
        registrar.on_after("list", |_, payload| {
            payload["served_by"] = json!("guard");
        });
        registrar.register_action("archive", Archive);
        registrar.register_permission("orders", "clerk", ["archive"]);
    }
}

fn guarded() -> common::TestGateway {
    let mut registry = PluginRegistry::with_builtin();
    registry.register(|| Box::new(Guard));
    common::gateway_with(common::test_config(), &registry)
}

#[test]
fn test_before_hook_rejects() {
    let gw = guarded();
    gw.execute(post("create", "orders", ADMIN_KEY, &json!({"item": "pen"})));

    let response = gw.execute(
        ApiRequest::new(Method::DELETE)
            .with_action("delete")
            .with_table("orders")
            .with_param("id", "1")
            .with_header("X-API-Key", ADMIN_KEY),
    );
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body_json().unwrap()["message"], "orders are frozen");
}

#[test]
fn test_after_hook_amends_payload_before_caching() {
    let gw = guarded();
    let live = gw.execute(get("list", "orders", ADMIN_KEY));
    let cached = gw.execute(get("list", "orders", ADMIN_KEY));

    assert_eq!(live.body_json().unwrap()["served_by"], "guard");
    assert_eq!(cached.body_json().unwrap()["served_by"], "guard");
}

#[test]
fn test_plugin_grant_extends_role() {
    let gw = guarded();
    let response = gw.execute(post("archive", "orders", CLERK_KEY, &json!({})));
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_json().unwrap(), json!({"archived": "orders"}));

    // The grant is table-scoped; other tables still fall back to the wildcard.
    assert_eq!(
        gw.execute(post("archive", "users", CLERK_KEY, &json!({}))).status,
        StatusCode::FORBIDDEN
    );
}
