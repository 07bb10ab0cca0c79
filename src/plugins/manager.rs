//! Plugin loading and the resident plugin state.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::registrar::{Hooks, PermissionGrants, Registrar};
use super::resolver::{resolve_order, Node};
use super::{Plugin, PluginInfo, PluginLoadError, PluginRegistry};
use crate::config::PluginConfig;
use crate::pipeline::action::ActionHandler;
use crate::pipeline::builtin;

/// Loaded plugins in resolved order plus everything they registered.
/// Immutable after construction.
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
    actions: BTreeMap<String, Arc<dyn ActionHandler>>,
    grants: PermissionGrants,
    hooks: Hooks,
}

impl PluginManager {
    /// A manager with no plugins.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Discover from the registry, honoring `plugins.enabled`.
    pub fn load(registry: &PluginRegistry, config: &PluginConfig) -> Result<Self, PluginLoadError> {
        let discovered = registry.discover(config.enabled.as_deref())?;
        Self::from_plugins(discovered)
    }

    /// Resolve, register and boot the given plugins.
    pub fn from_plugins(discovered: Vec<Box<dyn Plugin>>) -> Result<Self, PluginLoadError> {
        let nodes: Vec<Node> = discovered
            .iter()
            .map(|p| Node {
                name: p.name().to_string(),
                dependencies: p.dependencies(),
            })
            .collect();
        let order = resolve_order(&nodes)?;

        let mut slots: Vec<Option<Box<dyn Plugin>>> = discovered.into_iter().map(Some).collect();
        let plugins: Vec<Box<dyn Plugin>> =
            order.iter().filter_map(|&i| slots[i].take()).collect();

        let mut registrar = Registrar::new();
        for plugin in &plugins {
            registrar.begin(plugin.name());
            plugin.register(&mut registrar);
            tracing::debug!(plugin = plugin.name(), "Plugin registered");
        }

        let mut actions: BTreeMap<String, Arc<dyn ActionHandler>> = BTreeMap::new();
        for registered in registrar.actions {
            if builtin::is_builtin(&registered.name) || actions.contains_key(&registered.name) {
                return Err(PluginLoadError::DuplicateAction {
                    action: registered.name,
                    plugin: registered.plugin,
                });
            }
            actions.insert(registered.name, registered.handler);
        }

        for plugin in &plugins {
            plugin.boot().map_err(|e| PluginLoadError::Boot {
                plugin: plugin.name().to_string(),
                reason: e.to_string(),
            })?;
        }

        tracing::info!(
            plugins = ?plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            actions = actions.len(),
            "Plugins loaded"
        );

        Ok(Self {
            plugins,
            actions,
            grants: registrar.grants,
            hooks: registrar.hooks,
        })
    }

    pub fn boot_order(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn action(&self, name: &str) -> Option<&Arc<dyn ActionHandler>> {
        self.actions.get(name)
    }

    pub fn actions(&self) -> impl Iterator<Item = (&str, &Arc<dyn ActionHandler>)> {
        self.actions.iter().map(|(name, handler)| (name.as_str(), handler))
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    pub fn grants(&self) -> &PermissionGrants {
        &self.grants
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn describe(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|p| PluginInfo {
                name: p.name().to_string(),
                display_name: p.display_name().to_string(),
                version: p.version().to_string(),
                dependencies: p.dependencies(),
            })
            .collect()
    }

    /// Run every `install` in resolved order.
    pub fn install_all(&self) -> Result<(), PluginLoadError> {
        for plugin in &self.plugins {
            plugin.install().map_err(|e| PluginLoadError::Lifecycle {
                plugin: plugin.name().to_string(),
                phase: "install",
                reason: e.to_string(),
            })?;
            tracing::info!(plugin = plugin.name(), "Plugin installed");
        }
        Ok(())
    }

    /// Run every `uninstall` in reverse order.
    pub fn uninstall_all(&self) -> Result<(), PluginLoadError> {
        for plugin in self.plugins.iter().rev() {
            plugin.uninstall().map_err(|e| PluginLoadError::Lifecycle {
                plugin: plugin.name().to_string(),
                phase: "uninstall",
                reason: e.to_string(),
            })?;
            tracing::info!(plugin = plugin.name(), "Plugin uninstalled");
        }
        Ok(())
    }
}
