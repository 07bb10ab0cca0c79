//! `stats` action: row count of a table.

use serde_json::{json, Value};

use crate::data::ListQuery;
use crate::error::{ActionError, ApiError};
use crate::pipeline::action::{ActionContext, ActionHandler, ActionKind};
use crate::plugins::{Plugin, Registrar};
use crate::security::rbac::WILDCARD;

pub struct TableStatsPlugin;

struct StatsAction;

impl ActionHandler for StatsAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Read
    }

    fn handle(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
        let table = ctx
            .table
            .ok_or_else(|| ApiError::BadRequest("stats requires a table".to_string()))?;
        let rows = ctx.data.count(table, &ListQuery::default())?;
        Ok(json!({ "table": table, "rows": rows }))
    }
}

impl Plugin for TableStatsPlugin {
    fn name(&self) -> &str {
        "table_stats"
    }

    fn display_name(&self) -> &str {
        "Table Statistics"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn dependencies(&self) -> Vec<String> {
        vec!["audit".to_string()]
    }

    fn register(&self, registrar: &mut Registrar) {
        registrar.register_action("stats", StatsAction);
        registrar.register_permission(WILDCARD, "admin", ["stats"]);
    }
}
