//! Plugin subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (once):
//!     PluginRegistry (explicit factories)
//!     → discover (instantiate, filter by plugins.enabled)
//!     → resolver.rs (depth-first topological sort, cycle/missing checks)
//!     → register (in resolved order, through a Registrar)
//!     → boot (same order, after every registration)
//!     → PluginManager (immutable: actions, grants, hooks)
//! ```
//!
//! # Design Decisions
//! - No reflection or directory scanning; plugins are compiled in and listed
//!   in a registry
//! - Discovery order is the tie-break, so boot order is reproducible
//! - Any load failure aborts startup; nothing surfaces per request

pub mod builtin;
pub mod manager;
pub mod registrar;
pub mod resolver;

use serde::Serialize;
use thiserror::Error;

pub use manager::PluginManager;
pub use registrar::{AfterHook, BeforeHook, HookContext, Hooks, PermissionGrants, Registrar};

/// Result of plugin lifecycle callbacks.
pub type PluginResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A compiled-in extension.
pub trait Plugin: Send + Sync {
    /// Unique name, also used in dependency lists.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    fn version(&self) -> &str;

    /// Names of plugins that must register and boot first.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Declare actions, permission grants and hooks.
    fn register(&self, registrar: &mut Registrar);

    /// Runs after every plugin has registered.
    fn boot(&self) -> PluginResult {
        Ok(())
    }

    /// One-time setup. Must be idempotent.
    fn install(&self) -> PluginResult {
        Ok(())
    }

    fn uninstall(&self) -> PluginResult {
        Ok(())
    }
}

/// Startup failures of the plugin system.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PluginLoadError {
    #[error("circular plugin dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("plugin {plugin} depends on missing plugin {dependency}")]
    MissingDependency { plugin: String, dependency: String },

    #[error("plugin {0} is registered more than once")]
    Duplicate(String),

    #[error("plugin {0} is enabled but not registered")]
    Unknown(String),

    #[error("action {action} from plugin {plugin} is already defined")]
    DuplicateAction { action: String, plugin: String },

    #[error("plugin {plugin} failed to boot: {reason}")]
    Boot { plugin: String, reason: String },

    /// Install or uninstall failure.
    #[error("plugin {plugin} failed to {phase}: {reason}")]
    Lifecycle {
        plugin: String,
        phase: &'static str,
        reason: String,
    },
}

/// Summary of a loaded plugin.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub dependencies: Vec<String>,
}

type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Explicit list of available plugins, in discovery order.
#[derive(Default)]
pub struct PluginRegistry {
    factories: Vec<PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the plugins shipped with the gateway.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate plugins in registration order. With an `enabled` list,
    /// only the named plugins are kept and every name must exist.
    pub fn discover(
        &self,
        enabled: Option<&[String]>,
    ) -> Result<Vec<Box<dyn Plugin>>, PluginLoadError> {
        let plugins: Vec<Box<dyn Plugin>> = self.factories.iter().map(|f| f()).collect();
        let Some(enabled) = enabled else {
            return Ok(plugins);
        };

        if let Some(unknown) = enabled
            .iter()
            .find(|name| !plugins.iter().any(|p| p.name() == name.as_str()))
        {
            return Err(PluginLoadError::Unknown(unknown.clone()));
        }
        Ok(plugins
            .into_iter()
            .filter(|p| enabled.iter().any(|name| name == p.name()))
            .collect())
    }
}
