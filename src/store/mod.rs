//! Row/table storage backend
//!
//! The core talks to storage only through [`RowStore`]: select, insert,
//! update and delete over JSON rows, narrowed by a [`Query`]. Two backends
//! ship: `MemoryStore` for tests and [`SqliteStore`] for the server.

#[cfg(test)]
mod memory;
mod sqlite;

#[cfg(test)]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
#[cfg(test)]
use std::cmp::Ordering;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
  WorkoutPlans,
  TrainingSessions,
  TrainingSets,
}

impl Table {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::WorkoutPlans => "workout_plans",
      Self::TrainingSessions => "training_sessions",
      Self::TrainingSets => "training_sets",
    }
  }
}

impl std::fmt::Display for Table {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
/// Error Handling
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Invalid column name: {0}")]
  InvalidColumn(String),

  #[error("Unsupported filter value for column {0}")]
  UnsupportedValue(String),

  #[cfg(test)]
  #[error("Storage backend unavailable: {0}")]
  Unavailable(String),
}

// ---------------------------------------------------------------------------
/// Query: equality/membership filters, ordering, limit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
  Eq(String, Value),
  In(String, Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
  pub column: String,
  pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
  pub filters: Vec<Filter>,
  pub order: Vec<OrderBy>,
  pub limit: Option<usize>,
}

impl Query {
  /// Matches every row
  pub fn all() -> Self {
    Self::default()
  }

  pub fn filter_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::Eq(column.to_string(), value.into()));
    self
  }

  pub fn filter_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
    let values = values.into_iter().map(Into::into).collect();
    self.filters.push(Filter::In(column.to_string(), values));
    self
  }

  pub fn order_by(mut self, column: &str, descending: bool) -> Self {
    self.order.push(OrderBy {
      column: column.to_string(),
      descending,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Whether `row` passes every filter
  #[cfg(test)]
  pub fn matches(&self, row: &Row) -> bool {
    self.filters.iter().all(|filter| match filter {
      Filter::Eq(column, value) => field(row, column) == value,
      Filter::In(column, values) => values.iter().any(|v| field(row, column) == v),
    })
  }

  /// Ordering between two rows under this query's `order` clauses
  #[cfg(test)]
  pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
    for clause in &self.order {
      let ord = compare_values(field(a, &clause.column), field(b, &clause.column));
      let ord = if clause.descending { ord.reverse() } else { ord };
      if ord != Ordering::Equal {
        return ord;
      }
    }
    Ordering::Equal
  }
}

#[cfg(test)]
fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
  row.get(column).unwrap_or(&Value::Null)
}

/// Null < bool < number < string; nulls sort first ascending, as in SQLite
#[cfg(test)]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
  fn rank(v: &Value) -> u8 {
    match v {
      Value::Null => 0,
      Value::Bool(_) => 1,
      Value::Number(_) => 2,
      Value::String(_) => 3,
      Value::Array(_) | Value::Object(_) => 4,
    }
  }

  match (a, b) {
    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
    (Value::Number(x), Value::Number(y)) => {
      let x = x.as_f64().unwrap_or(0.0);
      let y = y.as_f64().unwrap_or(0.0);
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Value::String(x), Value::String(y)) => x.cmp(y),
    _ => rank(a).cmp(&rank(b)),
  }
}

// ---------------------------------------------------------------------------
/// The storage interface
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RowStore: Send + Sync {
  /// Rows matching `query`, ordered and limited
  async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError>;

  /// Insert rows, returning them as stored
  async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

  /// Merge `patch` into every row matching `query`'s filters, returning the
  /// updated rows. Ordering and limit are ignored.
  async fn update(&self, table: Table, patch: Row, query: &Query) -> Result<Vec<Row>, StoreError>;

  /// Delete rows matching `query`'s filters, returning the deleted rows
  async fn delete(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError>;
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, StoreError> {
  match serde_json::to_value(value)? {
    Value::Object(map) => Ok(map),
    _ => Err(StoreError::UnsupportedValue("<row>".to_string())),
  }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
  Ok(serde_json::from_value(Value::Object(row))?)
}
