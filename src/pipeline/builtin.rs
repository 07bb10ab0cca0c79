//! Built-in actions over the data layer.

use serde_json::{json, Value};

use super::action::{ActionContext, ActionHandler, ActionKind};
use crate::data::{id_to_string, ListQuery, Row};
use crate::error::{ActionError, ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    List,
    Count,
    Read,
    Create,
    Update,
    Delete,
    BulkCreate,
    BulkUpdate,
    BulkDelete,
    Tables,
    Login,
}

impl BuiltinAction {
    pub const ALL: [BuiltinAction; 11] = [
        BuiltinAction::List,
        BuiltinAction::Count,
        BuiltinAction::Read,
        BuiltinAction::Create,
        BuiltinAction::Update,
        BuiltinAction::Delete,
        BuiltinAction::BulkCreate,
        BuiltinAction::BulkUpdate,
        BuiltinAction::BulkDelete,
        BuiltinAction::Tables,
        BuiltinAction::Login,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinAction::List => "list",
            BuiltinAction::Count => "count",
            BuiltinAction::Read => "read",
            BuiltinAction::Create => "create",
            BuiltinAction::Update => "update",
            BuiltinAction::Delete => "delete",
            BuiltinAction::BulkCreate => "bulk_create",
            BuiltinAction::BulkUpdate => "bulk_update",
            BuiltinAction::BulkDelete => "bulk_delete",
            BuiltinAction::Tables => "tables",
            BuiltinAction::Login => "login",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.name() == name)
    }
}

pub fn is_builtin(name: &str) -> bool {
    BuiltinAction::from_name(name).is_some()
}

fn required_table<'a>(ctx: &ActionContext<'a>) -> Result<&'a str, ActionError> {
    ctx.table
        .ok_or_else(|| ApiError::BadRequest(format!("Action '{}' requires a table", ctx.action)).into())
}

fn required_id<'a>(ctx: &ActionContext<'a>) -> Result<&'a str, ActionError> {
    ctx.request
        .params
        .get("id")
        .map(String::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Action '{}' requires an id", ctx.action)).into())
}

fn body(ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
    ctx.request
        .json_body()?
        .ok_or_else(|| ApiError::BadRequest("A JSON body is required".to_string()).into())
}

fn object(value: Value) -> Result<Row, ActionError> {
    match value {
        Value::Object(row) => Ok(row),
        _ => Err(ApiError::BadRequest("Expected a JSON object".to_string()).into()),
    }
}

/// A JSON array of objects, bare or under `rows`.
fn rows(value: Value) -> Result<Vec<Row>, ActionError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut wrapper) => match wrapper.remove("rows") {
            Some(Value::Array(items)) => items,
            _ => return Err(ApiError::BadRequest("Expected an array of rows".to_string()).into()),
        },
        _ => return Err(ApiError::BadRequest("Expected an array of rows".to_string()).into()),
    };
    items.into_iter().map(object).collect()
}

/// Ids from the body (`[..]` or `{"ids": [..]}`), else the comma separated
/// `ids` parameter.
fn ids(ctx: &ActionContext<'_>) -> Result<Vec<String>, ActionError> {
    let from_body = match ctx.request.json_body()? {
        Some(Value::Array(items)) => Some(items),
        Some(Value::Object(mut wrapper)) => match wrapper.remove("ids") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    };
    let ids: Vec<String> = match from_body {
        Some(items) => items.iter().map(id_to_string).collect(),
        None => ctx
            .param("ids")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
    };
    if ids.is_empty() {
        return Err(ApiError::BadRequest("bulk_delete requires ids".to_string()).into());
    }
    Ok(ids)
}

impl ActionHandler for BuiltinAction {
    fn kind(&self) -> ActionKind {
        match self {
            BuiltinAction::List | BuiltinAction::Count | BuiltinAction::Read => ActionKind::Read,
            BuiltinAction::Create
            | BuiltinAction::Update
            | BuiltinAction::Delete
            | BuiltinAction::BulkCreate
            | BuiltinAction::BulkUpdate
            | BuiltinAction::BulkDelete => ActionKind::Write,
            BuiltinAction::Tables => ActionKind::Meta,
            BuiltinAction::Login => ActionKind::Anonymous,
        }
    }

    fn handle(&self, ctx: &ActionContext<'_>) -> Result<Value, ActionError> {
        match self {
            BuiltinAction::List => {
                let table = required_table(ctx)?;
                let query = ListQuery::from_params(&ctx.request.params)?;
                let rows = ctx.data.list(table, &query)?;
                Ok(json!({ "data": rows, "count": rows.len() }))
            }
            BuiltinAction::Count => {
                let table = required_table(ctx)?;
                let mut query = ListQuery::from_params(&ctx.request.params)?;
                query.limit = None;
                query.offset = 0;
                Ok(json!({ "count": ctx.data.count(table, &query)? }))
            }
            BuiltinAction::Read => {
                let table = required_table(ctx)?;
                Ok(json!({ "data": ctx.data.read(table, required_id(ctx)?)? }))
            }
            BuiltinAction::Create => {
                let table = required_table(ctx)?;
                let row = object(body(ctx)?)?;
                Ok(json!({ "data": ctx.data.create(table, row)? }))
            }
            BuiltinAction::Update => {
                let table = required_table(ctx)?;
                let id = required_id(ctx)?;
                let changes = object(body(ctx)?)?;
                Ok(json!({ "data": ctx.data.update(table, id, changes)? }))
            }
            BuiltinAction::Delete => {
                let table = required_table(ctx)?;
                let id = required_id(ctx)?;
                ctx.data.delete(table, id)?;
                Ok(json!({ "deleted": id }))
            }
            BuiltinAction::BulkCreate => {
                let table = required_table(ctx)?;
                let created = ctx.data.bulk_create(table, rows(body(ctx)?)?)?;
                Ok(json!({ "count": created.len(), "data": created }))
            }
            BuiltinAction::BulkUpdate => {
                let table = required_table(ctx)?;
                let updated = ctx.data.bulk_update(table, rows(body(ctx)?)?)?;
                Ok(json!({ "count": updated.len(), "data": updated }))
            }
            BuiltinAction::BulkDelete => {
                let table = required_table(ctx)?;
                let deleted = ctx.data.bulk_delete(table, &ids(ctx)?)?;
                Ok(json!({ "deleted": deleted }))
            }
            BuiltinAction::Tables => Ok(json!({ "tables": ctx.data.tables() })),
            BuiltinAction::Login => Ok(ctx.authenticator.login(ctx.request)?),
        }
    }
}
