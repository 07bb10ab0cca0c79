//! Action handlers and what they are allowed to see.

use serde_json::Value;

use crate::data::DataSource;
use crate::error::ActionError;
use crate::pipeline::request::ApiRequest;
use crate::security::auth::{Authenticator, Principal};

/// Classification driving method checks, authorization scope and caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Table-scoped, cacheable.
    Read,
    /// Table-scoped, invalidates the table's cache entries.
    Write,
    /// Not tied to a table; authorized against `*`.
    Meta,
    /// Runs without authentication.
    Anonymous,
}

impl ActionKind {
    pub fn requires_table(self) -> bool {
        matches!(self, ActionKind::Read | ActionKind::Write)
    }

    pub fn is_cacheable(self) -> bool {
        self == ActionKind::Read
    }

    pub fn is_mutating(self) -> bool {
        self == ActionKind::Write
    }

    pub fn requires_auth(self) -> bool {
        self != ActionKind::Anonymous
    }
}

/// Inputs a handler runs with. Table and action are already validated and
/// authorized when the handler sees them.
pub struct ActionContext<'a> {
    pub request: &'a ApiRequest,
    pub action: &'a str,
    pub table: Option<&'a str>,
    pub principal: Option<&'a Principal>,
    pub data: &'a dyn DataSource,
    pub authenticator: &'a dyn Authenticator,
}

impl ActionContext<'_> {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.params.get(name).map(String::as_str)
    }
}

/// A named operation, built in or contributed by a plugin.
pub trait ActionHandler: Send + Sync {
    fn kind(&self) -> ActionKind;

    fn handle(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError>;
}
