//! Data layer boundary.
//!
//! The gateway never builds SQL itself. Every table operation goes through
//! the [`DataSource`] trait; [`memory::MemoryDataSource`] is the bundled
//! implementation used for development and tests.

pub mod memory;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub use memory::MemoryDataSource;

/// A JSON object row.
pub type Row = Map<String, Value>;

/// Errors reported by a data source.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("no row {id} in table {table}")]
    RowNotFound { table: String, id: String },

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Filters and paging for `list` and `count`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Column → required value (string equality).
    pub filters: BTreeMap<String, String>,
    /// Column to sort by; descending when `descending` is set.
    pub order_by: Option<String>,
    pub descending: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Query parameters with a meaning of their own; everything else is a filter.
const RESERVED_PARAMS: &[&str] = &["limit", "offset", "order", "id", "api_key"];

impl ListQuery {
    /// Build a query from request parameters.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, DataError> {
        let mut query = ListQuery::default();

        if let Some(limit) = params.get("limit") {
            let limit = limit
                .parse()
                .map_err(|_| DataError::Invalid(format!("limit must be a number, got {limit:?}")))?;
            query.limit = Some(limit);
        }
        if let Some(offset) = params.get("offset") {
            query.offset = offset
                .parse()
                .map_err(|_| DataError::Invalid(format!("offset must be a number, got {offset:?}")))?;
        }
        if let Some(order) = params.get("order") {
            let (column, descending) = match order.strip_prefix('-') {
                Some(column) => (column, true),
                None => (order.as_str(), false),
            };
            if !is_valid_identifier(column) {
                return Err(DataError::Invalid(format!("invalid order column {column:?}")));
            }
            query.order_by = Some(column.to_string());
            query.descending = descending;
        }

        for (key, value) in params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            if !is_valid_identifier(key) {
                return Err(DataError::Invalid(format!("invalid filter column {key:?}")));
            }
            query.filters.insert(key.clone(), value.clone());
        }

        Ok(query)
    }
}

/// Table access used by the built-in actions.
pub trait DataSource: Send + Sync {
    /// Names of all tables, sorted.
    fn tables(&self) -> Vec<String>;

    fn has_table(&self, table: &str) -> bool;

    fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<Value>, DataError>;

    fn count(&self, table: &str, query: &ListQuery) -> Result<u64, DataError>;

    fn read(&self, table: &str, id: &str) -> Result<Value, DataError>;

    /// Insert a row and return it as stored (including its generated id).
    fn create(&self, table: &str, row: Row) -> Result<Value, DataError>;

    /// Merge `changes` into an existing row and return the result.
    fn update(&self, table: &str, id: &str, changes: Row) -> Result<Value, DataError>;

    fn delete(&self, table: &str, id: &str) -> Result<(), DataError>;

    fn bulk_create(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Value>, DataError> {
        rows.into_iter().map(|row| self.create(table, row)).collect()
    }

    /// Each row must carry its `id`.
    fn bulk_update(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Value>, DataError> {
        rows.into_iter()
            .map(|mut row| {
                let id = row
                    .remove("id")
                    .map(|id| id_to_string(&id))
                    .ok_or_else(|| DataError::Invalid("bulk_update rows need an id".into()))?;
                self.update(table, &id, row)
            })
            .collect()
    }

    fn bulk_delete(&self, table: &str, ids: &[String]) -> Result<u64, DataError> {
        for id in ids {
            self.delete(table, id)?;
        }
        Ok(ids.len() as u64)
    }
}

/// Table and column names: ASCII letters, digits and underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Render a JSON id (number or string) as the string form used in lookups.
pub fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
