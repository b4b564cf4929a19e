//! Durable event record.
//!
//! [`EventStore`] sits between the bus and [`EventRepo`]. Only
//! [`append`](EventStore::append) reports failure to its caller; every other
//! operation logs the error and returns an empty or zero result, so a broken
//! database degrades observability without stopping dispatch.

use modular_core::event::Event;
use modular_db::models::event::{EventQuery, EventRow, EventStats, PurgeCriteria};
use modular_db::repositories::EventRepo;
use modular_db::DbPool;

use crate::error::StorageError;

/// Handle to the `events` table. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct EventStore {
    pool: DbPool,
}

impl EventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Upsert the event keyed by its id.
    pub async fn append(&self, event: &Event) -> Result<(), StorageError> {
        let row = EventRow::from_event(event)?;
        EventRepo::upsert(&self.pool, &row).await?;
        Ok(())
    }

    /// Flag the event as dispatched. Returns `false` when it is not stored
    /// or the update failed.
    pub async fn mark_processed(&self, id: &str) -> bool {
        match EventRepo::mark_processed(&self.pool, id).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(error = %e, event_id = %id, "Failed to mark event processed");
                false
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Event> {
        match self.try_get(id).await {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, event_id = %id, "Failed to load event");
                None
            }
        }
    }

    /// Filtered listing, newest first.
    pub async fn query(&self, params: &EventQuery) -> Vec<Event> {
        match EventRepo::query(&self.pool, params).await {
            Ok(rows) => decode_rows(rows),
            Err(e) => {
                tracing::error!(error = %e, "Failed to query events");
                Vec::new()
            }
        }
    }

    /// Number of events matching the filter, ignoring pagination.
    pub async fn count(&self, params: &EventQuery) -> i64 {
        EventRepo::count(&self.pool, params).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to count events");
            0
        })
    }

    /// Events not yet dispatched, newest first.
    pub async fn unprocessed(&self, limit: i64) -> Vec<Event> {
        self.query(&EventQuery {
            processed: Some(false),
            limit: Some(limit),
            ..EventQuery::default()
        })
        .await
    }

    /// Aggregate counts. Any failing aggregate leaves its part at zero.
    pub async fn stats(&self) -> EventStats {
        let mut stats = EventStats::default();

        match EventRepo::count_all(&self.pool).await {
            Ok(total) => stats.total_events = total,
            Err(e) => tracing::error!(error = %e, "Failed to count events"),
        }

        match EventRepo::count_by_type(&self.pool).await {
            Ok(rows) => stats.events_by_type = rows.into_iter().collect(),
            Err(e) => tracing::error!(error = %e, "Failed to count events by type"),
        }

        match EventRepo::count_by_processed(&self.pool).await {
            Ok(rows) => {
                for (processed, count) in rows {
                    if processed {
                        stats.processed_events += count;
                    } else {
                        stats.unprocessed_events += count;
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to count events by processed flag"),
        }

        match EventRepo::count_by_priority(&self.pool).await {
            Ok(rows) => stats.events_by_priority = rows.into_iter().collect(),
            Err(e) => tracing::error!(error = %e, "Failed to count events by priority"),
        }

        stats
    }

    /// Delete matching events and return how many went.
    pub async fn purge(&self, criteria: &PurgeCriteria) -> u64 {
        match EventRepo::purge(&self.pool, criteria).await {
            Ok(deleted) => {
                tracing::info!(
                    deleted,
                    processed_only = criteria.processed_only,
                    "Purged events"
                );
                deleted
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to purge events");
                0
            }
        }
    }

    async fn try_get(&self, id: &str) -> Result<Option<Event>, StorageError> {
        match EventRepo::find_by_id(&self.pool, id).await? {
            Some(row) => Ok(Some(row.into_event()?)),
            None => Ok(None),
        }
    }
}

/// Decode rows, skipping (and logging) any that no longer parse.
fn decode_rows(rows: Vec<EventRow>) -> Vec<Event> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match row.into_event() {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::error!(error = %e, event_id = %id, "Skipping unreadable event row");
                    None
                }
            }
        })
        .collect()
}
