//! Query results
//!
//! A [`ResultSet`] keeps the raw engine response and extracts row records on
//! demand. Each call to [`ResultSet::rows`] walks the response again, so the
//! sequence can be restarted at will.

use serde_json::{Map, Value};

use crate::query::ast::QueryType;
use crate::query::paging::PagingIdentifiers;

/// Response of a single query request
#[derive(Debug, Clone)]
pub struct ResultSet {
    query_type: QueryType,
    raw: Value,
    /// Wall-clock time of the request in milliseconds
    pub execution_time_ms: u64,
}

impl ResultSet {
    pub fn new(query_type: QueryType, raw: Value, execution_time_ms: u64) -> Self {
        Self {
            query_type,
            raw,
            execution_time_ms,
        }
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// The untouched response body
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    fn entries(&self) -> impl Iterator<Item = &Value> + '_ {
        self.raw.as_array().into_iter().flatten()
    }

    /// Row records for this query type
    pub fn rows(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        match self.query_type {
            QueryType::Select => Box::new(
                self.entries()
                    .filter_map(select_body)
                    .filter_map(|body| body.get("events").and_then(Value::as_array))
                    .flatten()
                    .map(|event| event.get("event").cloned().unwrap_or_else(|| event.clone())),
            ),
            QueryType::GroupBy => Box::new(
                self.entries()
                    .map(|entry| entry.get("event").cloned().unwrap_or_else(|| entry.clone())),
            ),
            QueryType::Timeseries => Box::new(self.entries().filter_map(|entry| {
                let mut row = entry.get("result")?.as_object()?.clone();
                if let Some(ts) = entry.get("timestamp") {
                    row.insert("timestamp".to_string(), ts.clone());
                }
                Some(Value::Object(row))
            })),
            QueryType::TopN => Box::new(
                self.entries()
                    .filter_map(|entry| entry.get("result").and_then(Value::as_array))
                    .flatten()
                    .cloned(),
            ),
            QueryType::TimeBoundary | QueryType::DataSourceMetadata => Box::new(
                self.entries()
                    .filter_map(|entry| entry.get("result"))
                    .cloned(),
            ),
            QueryType::SegmentMetadata => Box::new(
                self.entries()
                    .take(1)
                    .filter_map(|entry| entry.get("columns"))
                    .flat_map(column_rows),
            ),
        }
    }

    /// Continuation token carried by a select response
    pub fn paging_identifiers(&self) -> Option<PagingIdentifiers> {
        let body = self.entries().next().and_then(select_body)?;
        let identifiers = body.get("pagingIdentifiers")?;
        serde_json::from_value(identifiers.clone()).ok()
    }

    pub fn len(&self) -> usize {
        self.rows().count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().next().is_none()
    }
}

/// Column descriptions keyed by name, or already a list
fn column_rows(columns: &Value) -> Vec<Value> {
    match columns {
        Value::Object(map) => map
            .iter()
            .map(|(name, column)| {
                let mut row = column.as_object().cloned().unwrap_or_else(Map::new);
                row.insert("name".to_string(), Value::String(name.clone()));
                Value::Object(row)
            })
            .collect(),
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

/// Select payloads nest under `result`; tolerate them at the top level too
fn select_body(entry: &Value) -> Option<&Value> {
    match entry.get("result") {
        Some(result) => Some(result),
        None if entry.get("events").is_some() || entry.get("pagingIdentifiers").is_some() => {
            Some(entry)
        }
        None => None,
    }
}
