use async_trait::async_trait;
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{Filter, Query, Row, RowStore, StoreError, Table};

/// SQLite-backed row store.
///
/// Every table holds one JSON document per row (`id`, `doc`); filters and
/// ordering run against `json_extract(doc, '$.<column>')`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }
}

/// `$.column`, refusing anything that is not a plain identifier
fn json_path(column: &str) -> Result<String, StoreError> {
  let valid = !column.is_empty() && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
  if !valid {
    return Err(StoreError::InvalidColumn(column.to_string()));
  }
  Ok(format!("json_extract(doc, '$.{}')", column))
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, column: &str, value: &Value) -> Result<(), StoreError> {
  match value {
    Value::String(s) => {
      builder.push_bind(s.clone());
    }
    Value::Bool(b) => {
      builder.push_bind(*b);
    }
    Value::Number(n) => match n.as_i64() {
      Some(i) => {
        builder.push_bind(i);
      }
      None => {
        builder.push_bind(n.as_f64().unwrap_or_default());
      }
    },
    Value::Null | Value::Array(_) | Value::Object(_) => {
      return Err(StoreError::UnsupportedValue(column.to_string()));
    }
  }
  Ok(())
}

fn push_where(builder: &mut QueryBuilder<'_, Sqlite>, query: &Query) -> Result<(), StoreError> {
  for (idx, filter) in query.filters.iter().enumerate() {
    builder.push(if idx == 0 { " WHERE " } else { " AND " });
    match filter {
      Filter::Eq(column, Value::Null) => {
        builder.push(json_path(column)?).push(" IS NULL");
      }
      Filter::Eq(column, value) => {
        builder.push(json_path(column)?).push(" = ");
        push_value(builder, column, value)?;
      }
      Filter::In(column, values) if values.is_empty() => {
        // Validate the column even though nothing can match
        json_path(column)?;
        builder.push("0");
      }
      Filter::In(column, values) => {
        builder.push(json_path(column)?).push(" IN (");
        for (i, value) in values.iter().enumerate() {
          if i > 0 {
            builder.push(", ");
          }
          push_value(builder, column, value)?;
        }
        builder.push(")");
      }
    }
  }
  Ok(())
}

fn push_order_and_limit(builder: &mut QueryBuilder<'_, Sqlite>, query: &Query) -> Result<(), StoreError> {
  builder.push(" ORDER BY ");
  for clause in &query.order {
    builder
      .push(json_path(&clause.column)?)
      .push(if clause.descending { " DESC, " } else { " ASC, " });
  }
  // Ties keep insertion order
  builder.push("id ASC");

  if let Some(limit) = query.limit {
    builder.push(" LIMIT ").push_bind(limit as i64);
  }
  Ok(())
}

fn parse_doc(doc: &str) -> Result<Row, StoreError> {
  match serde_json::from_str(doc)? {
    Value::Object(map) => Ok(map),
    _ => Err(StoreError::UnsupportedValue("doc".to_string())),
  }
}

impl SqliteStore {
  async fn matching(&self, table: Table, query: &Query, ordered: bool) -> Result<Vec<(i64, Row)>, StoreError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, doc FROM ");
    builder.push(table.as_str());
    push_where(&mut builder, query)?;
    if ordered {
      push_order_and_limit(&mut builder, query)?;
    }

    let rows: Vec<(i64, String)> = builder.build_query_as().fetch_all(&self.pool).await?;
    rows
      .into_iter()
      .map(|(id, doc)| Ok((id, parse_doc(&doc)?)))
      .collect()
  }
}

#[async_trait]
impl RowStore for SqliteStore {
  async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
    let rows = self.matching(table, query, true).await?;
    Ok(rows.into_iter().map(|(_, row)| row).collect())
  }

  async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
    let sql = format!("INSERT INTO {} (doc) VALUES (?)", table.as_str());
    let mut tx = self.pool.begin().await?;
    for row in &rows {
      let doc = serde_json::to_string(row)?;
      sqlx::query(&sql).bind(doc).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(rows)
  }

  async fn update(&self, table: Table, patch: Row, query: &Query) -> Result<Vec<Row>, StoreError> {
    let targets = self.matching(table, query, false).await?;
    let sql = format!("UPDATE {} SET doc = ? WHERE id = ?", table.as_str());

    let mut tx = self.pool.begin().await?;
    let mut updated = Vec::with_capacity(targets.len());
    for (id, mut row) in targets {
      for (key, value) in &patch {
        row.insert(key.clone(), value.clone());
      }
      let doc = serde_json::to_string(&row)?;
      sqlx::query(&sql).bind(doc).bind(id).execute(&mut *tx).await?;
      updated.push(row);
    }
    tx.commit().await?;
    Ok(updated)
  }

  async fn delete(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
    let targets = self.matching(table, query, false).await?;
    let sql = format!("DELETE FROM {} WHERE id = ?", table.as_str());

    let mut tx = self.pool.begin().await?;
    for (id, _) in &targets {
      sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    Ok(targets.into_iter().map(|(_, row)| row).collect())
  }
}
