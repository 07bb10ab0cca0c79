//! Audit trail of mutating actions.

use crate::plugins::registrar::{HookContext, ANY_ACTION};
use crate::plugins::{Plugin, PluginResult, Registrar};

pub struct AuditPlugin;

fn record(ctx: &HookContext<'_>) {
    if !ctx.kind.is_mutating() {
        return;
    }
    tracing::info!(
        target: "audit",
        request_id = %ctx.request.request_id,
        user = ctx.principal.map(|p| p.user.as_str()).unwrap_or("-"),
        action = ctx.action,
        table = ctx.table.unwrap_or("-"),
        "Data modified"
    );
}

impl Plugin for AuditPlugin {
    fn name(&self) -> &str {
        "audit"
    }

    fn display_name(&self) -> &str {
        "Audit Trail"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn register(&self, registrar: &mut Registrar) {
        registrar.on_after(ANY_ACTION, |ctx, _payload| record(ctx));
    }

    fn boot(&self) -> PluginResult {
        tracing::debug!(target: "audit", "Audit trail active");
        Ok(())
    }
}
