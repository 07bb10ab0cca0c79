//! Role-based access control.
//!
//! Decisions are a pure lookup of (role, table, action):
//! - unknown role → deny
//! - an exact table entry wins over the wildcard; an empty entry is an
//!   explicit deny even when the wildcard would allow the action
//! - without an exact entry the `*` entry decides
//! - neither → deny

use std::collections::{HashMap, HashSet};

use crate::config::RoleConfig;
use crate::plugins::PermissionGrants;

/// Table key matching every table.
pub const WILDCARD: &str = "*";

/// Immutable permission table built once at startup.
#[derive(Debug, Clone, Default)]
pub struct Rbac {
    roles: HashMap<String, HashMap<String, HashSet<String>>>,
}

impl Rbac {
    /// Build from the configured role table.
    pub fn new(roles: &RoleConfig) -> Self {
        let roles = roles
            .iter()
            .map(|(role, tables)| {
                let tables = tables
                    .iter()
                    .map(|(table, actions)| (table.clone(), actions.iter().cloned().collect()))
                    .collect();
                (role.clone(), tables)
            })
            .collect();
        Self { roles }
    }

    /// Layer plugin grants on top. Grants are unioned into the configured
    /// sets; they never remove an action.
    ///
    /// A grant on a table the role has no exact entry for starts from the
    /// role's wildcard set, so the new entry cannot hide wildcard access.
    pub fn with_grants(mut self, grants: &PermissionGrants) -> Self {
        let (wildcard, scoped): (Vec<_>, Vec<_>) =
            grants.iter().partition(|(table, _, _)| *table == WILDCARD);

        for (table, role, actions) in wildcard.into_iter().chain(scoped) {
            let tables = self.roles.entry(role.to_string()).or_default();
            let inherited = tables.get(WILDCARD).cloned().unwrap_or_default();
            tables
                .entry(table.to_string())
                .or_insert(inherited)
                .extend(actions.iter().cloned());
        }
        self
    }

    pub fn role_exists(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    /// Decide whether `role` may perform `action` on `table`.
    pub fn is_allowed(&self, role: &str, table: &str, action: &str) -> bool {
        let Some(tables) = self.roles.get(role) else {
            return false;
        };

        if let Some(actions) = tables.get(table) {
            // Empty entry is an explicit deny; no fallback to the wildcard.
            return !actions.is_empty() && actions.contains(action);
        }

        tables
            .get(WILDCARD)
            .map(|actions| actions.contains(action))
            .unwrap_or(false)
    }
}
