//! The surface plugins use to declare what they contribute.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::pipeline::action::{ActionHandler, ActionKind};
use crate::pipeline::request::ApiRequest;
use crate::security::auth::Principal;

/// Action name matching every action in hook registrations.
pub const ANY_ACTION: &str = "*";

/// What a hook sees of the current request.
pub struct HookContext<'a> {
    pub action: &'a str,
    pub kind: ActionKind,
    pub table: Option<&'a str>,
    pub principal: Option<&'a Principal>,
    pub request: &'a ApiRequest,
}

/// Runs before dispatch; an error rejects the request.
pub type BeforeHook = Arc<dyn Fn(&HookContext<'_>) -> Result<(), ApiError> + Send + Sync>;

/// Runs after a successful handler and may amend the payload.
pub type AfterHook = Arc<dyn Fn(&HookContext<'_>, &mut Value) + Send + Sync>;

/// `table → role → actions` granted by plugins. Grants on the same pair are
/// unioned in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionGrants(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl PermissionGrants {
    pub fn grant<I, S>(&mut self, table: &str, role: &str, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let granted = self
            .0
            .entry(table.to_string())
            .or_default()
            .entry(role.to_string())
            .or_default();
        for action in actions {
            let action = action.into();
            if !granted.contains(&action) {
                granted.push(action);
            }
        }
    }

    pub fn merge(&mut self, other: &PermissionGrants) {
        for (table, role, actions) in other.iter() {
            self.grant(table, role, actions.iter().cloned());
        }
    }

    pub fn actions(&self, table: &str, role: &str) -> Option<&[String]> {
        self.0
            .get(table)
            .and_then(|roles| roles.get(role))
            .map(Vec::as_slice)
    }

    /// `(table, role, actions)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.0.iter().flat_map(|(table, roles)| {
            roles
                .iter()
                .map(move |(role, actions)| (table.as_str(), role.as_str(), actions.as_slice()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ordered before/after hooks keyed by action name.
#[derive(Clone, Default)]
pub struct Hooks {
    before: Vec<(String, BeforeHook)>,
    after: Vec<(String, AfterHook)>,
}

impl Hooks {
    fn matches(registered: &str, action: &str) -> bool {
        registered == ANY_ACTION || registered == action
    }

    /// Run matching before-hooks in registration order; the first error wins.
    pub fn run_before(&self, ctx: &HookContext<'_>) -> Result<(), ApiError> {
        self.before
            .iter()
            .filter(|(action, _)| Self::matches(action, ctx.action))
            .try_for_each(|(_, hook)| hook(ctx))
    }

    pub fn run_after(&self, ctx: &HookContext<'_>, payload: &mut Value) {
        for (_, hook) in self
            .after
            .iter()
            .filter(|(action, _)| Self::matches(action, ctx.action))
        {
            hook(ctx, payload);
        }
    }

    pub fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An action contributed by a plugin.
pub(crate) struct RegisteredAction {
    pub(crate) name: String,
    pub(crate) plugin: String,
    pub(crate) handler: Arc<dyn ActionHandler>,
}

/// Collects registrations from every plugin, in resolved order.
#[derive(Default)]
pub struct Registrar {
    current: String,
    pub(crate) actions: Vec<RegisteredAction>,
    pub(crate) grants: PermissionGrants,
    pub(crate) hooks: Hooks,
}

impl Registrar {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Name the plugin whose registrations follow.
    pub(crate) fn begin(&mut self, plugin: &str) {
        self.current = plugin.to_string();
    }

    pub fn on_before<F>(&mut self, action: &str, hook: F)
    where
        F: Fn(&HookContext<'_>) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.hooks.before.push((action.to_string(), Arc::new(hook)));
    }

    pub fn on_after<F>(&mut self, action: &str, hook: F)
    where
        F: Fn(&HookContext<'_>, &mut Value) + Send + Sync + 'static,
    {
        self.hooks.after.push((action.to_string(), Arc::new(hook)));
    }

    pub fn register_action<H>(&mut self, name: &str, handler: H)
    where
        H: ActionHandler + 'static,
    {
        self.actions.push(RegisteredAction {
            name: name.to_string(),
            plugin: self.current.clone(),
            handler: Arc::new(handler),
        });
    }

    pub fn register_permission<I, S>(&mut self, table: &str, role: &str, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants.grant(table, role, actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_grants_union_in_first_seen_order() {
        let mut grants = PermissionGrants::default();
        grants.grant("orders", "admin", ["read"]);
        grants.grant("orders", "admin", ["create", "read"]);

        assert_eq!(
            serde_json::to_value(&grants).unwrap(),
            json!({"orders": {"admin": ["read", "create"]}})
        );
    }

    #[test]
    fn test_merge_and_iter() {
        let mut a = PermissionGrants::default();
        a.grant("orders", "clerk", ["list"]);
        let mut b = PermissionGrants::default();
        b.grant("orders", "clerk", ["read"]);
        b.grant("users", "admin", ["delete"]);
        a.merge(&b);

        let triples: Vec<_> = a.iter().collect();
        assert_eq!(triples.len(), 2);
        assert_eq!(a.actions("orders", "clerk"), Some(&["list".to_string(), "read".to_string()][..]));
        assert_eq!(a.actions("users", "clerk"), None);
    }

    #[test]
    fn test_hooks_match_action_or_wildcard() {
        let mut registrar = Registrar::new();
        registrar.on_before("delete", |_| Err(ApiError::BadRequest("frozen".into())));
        registrar.on_after("*", |_, payload| {
            payload["tagged"] = json!(true);
        });

        let request = ApiRequest::new(Method::POST);
        let ctx = |action| HookContext {
            action,
            kind: ActionKind::Write,
            table: Some("orders"),
            principal: None,
            request: &request,
        };

        assert!(registrar.hooks.run_before(&ctx("create")).is_ok());
        assert!(registrar.hooks.run_before(&ctx("delete")).is_err());

        let mut payload = json!({});
        registrar.hooks.run_after(&ctx("create"), &mut payload);
        assert_eq!(payload["tagged"], json!(true));
        assert_eq!(registrar.hooks.len(), 2);
    }
}
