use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Query, Row, RowStore, StoreError, Table};

/// In-process row store with the same filter/order/limit semantics as
/// [`super::SqliteStore`]. Sorting is stable, so ties keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: Mutex<HashMap<Table, Vec<Row>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn tables(&self) -> Result<MutexGuard<'_, HashMap<Table, Vec<Row>>>, StoreError> {
    self
      .tables
      .lock()
      .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
  }
}

#[async_trait]
impl RowStore for MemoryStore {
  async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
    let tables = self.tables()?;
    let mut rows: Vec<Row> = tables
      .get(&table)
      .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
      .unwrap_or_default();

    if !query.order.is_empty() {
      rows.sort_by(|a, b| query.compare(a, b));
    }
    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }
    Ok(rows)
  }

  async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
    let mut tables = self.tables()?;
    tables.entry(table).or_default().extend(rows.iter().cloned());
    Ok(rows)
  }

  async fn update(&self, table: Table, patch: Row, query: &Query) -> Result<Vec<Row>, StoreError> {
    let mut tables = self.tables()?;
    let mut updated = Vec::new();
    if let Some(rows) = tables.get_mut(&table) {
      for row in rows.iter_mut().filter(|r| query.matches(r)) {
        for (key, value) in &patch {
          row.insert(key.clone(), value.clone());
        }
        updated.push(row.clone());
      }
    }
    Ok(updated)
  }

  async fn delete(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
    let mut tables = self.tables()?;
    let Some(rows) = tables.get_mut(&table) else {
      return Ok(Vec::new());
    };

    let (deleted, kept): (Vec<Row>, Vec<Row>) = rows.drain(..).partition(|r| query.matches(r));
    *rows = kept;
    Ok(deleted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{json, Value};

  fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
  }

  async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store
      .insert(
        Table::TrainingSets,
        vec![
          row(json!({"id": "a", "session_id": "s1", "exercise": "深蹲", "set_number": 1})),
          row(json!({"id": "b", "session_id": "s1", "exercise": "深蹲", "set_number": 2})),
          row(json!({"id": "c", "session_id": "s2", "exercise": "硬拉", "set_number": 1})),
        ],
      )
      .await
      .unwrap();
    store
  }

  #[tokio::test]
  async fn test_select_filters_orders_and_limits() {
    let store = seeded().await;

    let query = Query::all()
      .filter_eq("session_id", "s1")
      .order_by("set_number", true)
      .limit(1);
    let rows = store.select(Table::TrainingSets, &query).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "b");
  }

  #[tokio::test]
  async fn test_select_membership_and_empty_table() {
    let store = seeded().await;

    let rows = store
      .select(Table::TrainingSets, &Query::all().filter_in("id", ["a", "c"]))
      .await
      .unwrap();
    assert_eq!(rows.len(), 2);

    let none = store.select(Table::WorkoutPlans, &Query::all()).await.unwrap();
    assert!(none.is_empty());
  }

  #[tokio::test]
  async fn test_update_merges_patch() {
    let store = seeded().await;

    let patch = row(json!({"notes": "heavy"}));
    let updated = store
      .update(Table::TrainingSets, patch, &Query::all().filter_eq("exercise", "深蹲"))
      .await
      .unwrap();

    assert_eq!(updated.len(), 2);
    assert!(updated.iter().all(|r| r["notes"] == "heavy"));

    let untouched = store
      .select(Table::TrainingSets, &Query::all().filter_eq("id", "c"))
      .await
      .unwrap();
    assert!(untouched[0].get("notes").is_none());
  }

  #[tokio::test]
  async fn test_delete_returns_removed_rows() {
    let store = seeded().await;

    let deleted = store
      .delete(Table::TrainingSets, &Query::all().filter_eq("session_id", "s1"))
      .await
      .unwrap();
    assert_eq!(deleted.len(), 2);

    let remaining = store.select(Table::TrainingSets, &Query::all()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "c");
  }
}
