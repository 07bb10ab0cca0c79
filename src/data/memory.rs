//! In-memory table store.

use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{DataError, DataSource, ListQuery, Row};

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    rows: BTreeMap<u64, Row>,
}

/// Tables held in a concurrent map, rows keyed by an auto-increment id.
#[derive(Debug, Default)]
pub struct MemoryDataSource {
    tables: DashMap<String, Table>,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the given tables (existing tables are left untouched).
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = Self::new();
        for table in tables {
            source.create_table(table);
        }
        source
    }

    pub fn create_table(&self, name: impl Into<String>) {
        self.tables.entry(name.into()).or_default();
    }

    fn parse_id(table: &str, id: &str) -> Result<u64, DataError> {
        id.parse().map_err(|_| DataError::RowNotFound {
            table: table.to_string(),
            id: id.to_string(),
        })
    }

    fn filtered(table: &Table, query: &ListQuery) -> Vec<Row> {
        table
            .rows
            .values()
            .filter(|row| {
                query.filters.iter().all(|(column, expected)| {
                    row.get(column)
                        .map(|value| value_matches(value, expected))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect()
    }
}

fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Null => expected == "null",
        other => other.to_string() == expected,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl DataSource for MemoryDataSource {
    fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn list(&self, table: &str, query: &ListQuery) -> Result<Vec<Value>, DataError> {
        let guard = self
            .tables
            .get(table)
            .ok_or_else(|| DataError::UnknownTable(table.to_string()))?;
        let mut rows = Self::filtered(&guard, query);
        drop(guard);

        if let Some(column) = &query.order_by {
            rows.sort_by(|a, b| compare_values(a.get(column), b.get(column)));
            if query.descending {
                rows.reverse();
            }
        }

        Ok(rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(Value::Object)
            .collect())
    }

    fn count(&self, table: &str, query: &ListQuery) -> Result<u64, DataError> {
        let guard = self
            .tables
            .get(table)
            .ok_or_else(|| DataError::UnknownTable(table.to_string()))?;
        Ok(Self::filtered(&guard, query).len() as u64)
    }

    fn read(&self, table: &str, id: &str) -> Result<Value, DataError> {
        let key = Self::parse_id(table, id)?;
        let guard = self
            .tables
            .get(table)
            .ok_or_else(|| DataError::UnknownTable(table.to_string()))?;
        guard
            .rows
            .get(&key)
            .cloned()
            .map(Value::Object)
            .ok_or_else(|| DataError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    fn create(&self, table: &str, mut row: Row) -> Result<Value, DataError> {
        let mut guard = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DataError::UnknownTable(table.to_string()))?;
        guard.next_id += 1;
        let id = guard.next_id;
        row.insert("id".to_string(), Value::from(id));
        guard.rows.insert(id, row.clone());
        Ok(Value::Object(row))
    }

    fn update(&self, table: &str, id: &str, changes: Row) -> Result<Value, DataError> {
        let key = Self::parse_id(table, id)?;
        let mut guard = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DataError::UnknownTable(table.to_string()))?;
        let row = guard
            .rows
            .get_mut(&key)
            .ok_or_else(|| DataError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        for (column, value) in changes {
            if column != "id" {
                row.insert(column, value);
            }
        }
        Ok(Value::Object(row.clone()))
    }

    fn delete(&self, table: &str, id: &str) -> Result<(), DataError> {
        let key = Self::parse_id(table, id)?;
        let mut guard = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DataError::UnknownTable(table.to_string()))?;
        guard
            .rows
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| DataError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }
}
