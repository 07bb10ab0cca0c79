//! Plugins shipped with the gateway.

pub mod audit;
pub mod table_stats;

use super::PluginRegistry;

pub use audit::AuditPlugin;
pub use table_stats::TableStatsPlugin;

/// Add the bundled plugins in their discovery order.
pub fn register_all(registry: &mut PluginRegistry) {
    registry
        .register(|| Box::new(AuditPlugin))
        .register(|| Box::new(TableStatsPlugin));
}
