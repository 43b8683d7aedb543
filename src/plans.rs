//! Plan record persistence, read through [`PlanCache`]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::PlanCache;
use crate::models::PlanRecord;
use crate::store::{from_row, to_row, Query, RowStore, StoreError, Table};

const INSERT_BATCH_SIZE: usize = 50;

#[derive(Clone)]
pub struct PlanRepository {
  store: Arc<dyn RowStore>,
  cache: Arc<PlanCache>,
}

impl PlanRepository {
  pub fn new(store: Arc<dyn RowStore>, cache: Arc<PlanCache>) -> Self {
    Self { store, cache }
  }

  async fn load(&self, date: NaiveDate) -> Result<Option<PlanRecord>, StoreError> {
    let query = Query::all().filter_eq("date", date.to_string()).limit(1);
    let rows = self.store.select(Table::WorkoutPlans, &query).await?;
    match rows.into_iter().next() {
      Some(row) => Ok(Some(from_row(row)?)),
      None => {
        debug!(%date, "No plan for date");
        Ok(None)
      }
    }
  }

  /// Plan for one date; `None` is a rest day, not an error
  pub async fn plan_for_date(&self, date: NaiveDate) -> Result<Option<PlanRecord>, StoreError> {
    self.cache.get_or_refresh(date, || self.load(date)).await
  }

  /// Plans for a set of dates in one membership query
  pub async fn plans_for_dates(&self, dates: &[NaiveDate]) -> Result<HashMap<NaiveDate, PlanRecord>, StoreError> {
    let mut found = HashMap::new();
    let mut missing = Vec::new();
    for date in dates {
      match self.cache.get(date) {
        Some(Some(plan)) => {
          found.insert(*date, plan);
        }
        Some(None) => {}
        None => missing.push(*date),
      }
    }

    if missing.is_empty() {
      return Ok(found);
    }

    let query = Query::all().filter_in("date", missing.iter().map(|d| d.to_string()));
    let rows = self.store.select(Table::WorkoutPlans, &query).await?;
    for row in rows {
      let plan: PlanRecord = from_row(row)?;
      found.insert(plan.date, plan);
    }

    for date in missing {
      self.cache.insert(date, found.get(&date).cloned());
    }
    Ok(found)
  }

  /// Replace the whole table with `records`, then drop cached reads
  pub async fn replace_all(&self, records: &[PlanRecord]) -> Result<usize, StoreError> {
    let deleted = self.store.delete(Table::WorkoutPlans, &Query::all()).await?;
    info!(count = deleted.len(), "Cleared existing plans");

    for batch in records.chunks(INSERT_BATCH_SIZE) {
      let rows = batch.iter().map(to_row).collect::<Result<Vec<_>, _>>()?;
      self.store.insert(Table::WorkoutPlans, rows).await?;
      debug!(count = batch.len(), "Inserted plan batch");
    }

    self.cache.invalidate_all();
    Ok(records.len())
  }
}
