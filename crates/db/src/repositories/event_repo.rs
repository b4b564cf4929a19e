//! Repository for the `events` table.

use modular_core::types::Timestamp;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};

use crate::models::event::{EventQuery, EventRow, PurgeCriteria};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for `events` SELECT queries.
const COLUMNS: &str = "\
    id, event_type, timestamp, source_module, source_version, priority, \
    correlation_id, causation_id, idempotency_key, data, processed";

/// Page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: i64 = 100;

/// Upper bound on a single page.
pub const MAX_LIMIT: i64 = 1000;

// ---------------------------------------------------------------------------
// EventRepo
// ---------------------------------------------------------------------------

/// Provides read/write operations for stored events.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event, or overwrite the existing row with the same id.
    ///
    /// The `processed` flag of an existing row is left untouched so a replay
    /// never resurrects an already dispatched event as pending.
    pub async fn upsert(pool: &SqlitePool, row: &EventRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO events \
                (id, event_type, timestamp, source_module, source_version, priority, \
                 correlation_id, causation_id, idempotency_key, data, processed) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                event_type = excluded.event_type, \
                timestamp = excluded.timestamp, \
                source_module = excluded.source_module, \
                source_version = excluded.source_version, \
                priority = excluded.priority, \
                correlation_id = excluded.correlation_id, \
                causation_id = excluded.causation_id, \
                idempotency_key = excluded.idempotency_key, \
                data = excluded.data",
        )
        .bind(&row.id)
        .bind(&row.event_type)
        .bind(row.timestamp)
        .bind(&row.source_module)
        .bind(&row.source_version)
        .bind(&row.priority)
        .bind(&row.correlation_id)
        .bind(&row.causation_id)
        .bind(&row.idempotency_key)
        .bind(&row.data)
        .bind(row.processed)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Set the processed flag. Returns `false` when no row has this id.
    pub async fn mark_processed(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE events SET processed = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a single event by id.
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<EventRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM events WHERE id = ?");
        sqlx::query_as::<_, EventRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List events matching the filter, newest first.
    pub async fn query(pool: &SqlitePool, params: &EventQuery) -> Result<Vec<EventRow>, sqlx::Error> {
        let limit = clamp_limit(params.limit);
        let offset = clamp_offset(params.offset);

        let (where_clause, bind_values) = build_event_filter(params);
        let query = format!(
            "SELECT {COLUMNS} FROM events {where_clause} \
             ORDER BY timestamp DESC, rowid DESC \
             LIMIT ? OFFSET ?"
        );

        let q = bind_values_as(sqlx::query_as::<_, EventRow>(&query), &bind_values);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count events matching the filter, ignoring pagination.
    pub async fn count(pool: &SqlitePool, params: &EventQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values) = build_event_filter(params);
        let query = format!("SELECT COUNT(*) FROM events {where_clause}");

        let q = bind_values_scalar(sqlx::query_scalar::<_, i64>(&query), &bind_values);
        q.fetch_one(pool).await
    }

    /// Total number of stored events.
    pub async fn count_all(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(pool)
            .await
    }

    /// Event counts grouped by type.
    pub async fn count_by_type(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT event_type, COUNT(*) FROM events GROUP BY event_type")
            .fetch_all(pool)
            .await
    }

    /// Event counts grouped by processed flag.
    pub async fn count_by_processed(pool: &SqlitePool) -> Result<Vec<(bool, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT processed, COUNT(*) FROM events GROUP BY processed")
            .fetch_all(pool)
            .await
    }

    /// Event counts grouped by priority.
    pub async fn count_by_priority(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as("SELECT priority, COUNT(*) FROM events GROUP BY priority")
            .fetch_all(pool)
            .await
    }

    /// Delete events matching the criteria, returning how many were removed.
    pub async fn purge(pool: &SqlitePool, criteria: &PurgeCriteria) -> Result<u64, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_values: Vec<BindValue> = Vec::new();

        if let Some(older_than) = criteria.older_than {
            conditions.push("timestamp < ?".to_string());
            bind_values.push(BindValue::Timestamp(older_than));
        }

        if !criteria.event_types.is_empty() {
            conditions.push(in_list("event_type", criteria.event_types.len()));
            bind_values.extend(criteria.event_types.iter().cloned().map(BindValue::Text));
        }

        if criteria.processed_only {
            conditions.push("processed = 1".to_string());
        }

        let query = format!("DELETE FROM events {}", where_clause(&conditions));
        let result = bind_values_query(sqlx::query(&query), &bind_values)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Clamp a requested page size into `1..=MAX_LIMIT`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a requested offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// A typed bind value for dynamically built queries.
enum BindValue {
    Text(String),
    Timestamp(Timestamp),
    Bool(bool),
}

fn in_list(column: &str, len: usize) -> String {
    let placeholders = vec!["?"; len].join(", ");
    format!("{column} IN ({placeholders})")
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// Build a WHERE clause and matching bind values from the filter.
fn build_event_filter(params: &EventQuery) -> (String, Vec<BindValue>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_values: Vec<BindValue> = Vec::new();

    if !params.event_types.is_empty() {
        conditions.push(in_list("event_type", params.event_types.len()));
        bind_values.extend(params.event_types.iter().cloned().map(BindValue::Text));
    }

    if let Some(ref source_module) = params.source_module {
        conditions.push("source_module = ?".to_string());
        bind_values.push(BindValue::Text(source_module.clone()));
    }

    if let Some(ref correlation_id) = params.correlation_id {
        conditions.push("correlation_id = ?".to_string());
        bind_values.push(BindValue::Text(correlation_id.clone()));
    }

    if let Some(start) = params.start_time {
        conditions.push("timestamp >= ?".to_string());
        bind_values.push(BindValue::Timestamp(start));
    }

    if let Some(end) = params.end_time {
        conditions.push("timestamp <= ?".to_string());
        bind_values.push(BindValue::Timestamp(end));
    }

    if let Some(processed) = params.processed {
        conditions.push("processed = ?".to_string());
        bind_values.push(BindValue::Bool(processed));
    }

    (where_clause(&conditions), bind_values)
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_values_as<'q, O>(
    mut q: sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
            BindValue::Bool(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
fn bind_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, Sqlite, i64, SqliteArguments<'q>>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, Sqlite, i64, SqliteArguments<'q>> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
            BindValue::Bool(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a plain sqlx `Query`.
fn bind_values_query<'q>(
    mut q: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    bind_values: &'q [BindValue],
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    for val in bind_values {
        match val {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
            BindValue::Bool(v) => q = q.bind(*v),
        }
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_defaulted_and_clamped() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(50_000)), MAX_LIMIT);
        assert_eq!(clamp_offset(Some(-3)), 0);
    }

    #[test]
    fn filter_builds_in_list_for_types() {
        let params = EventQuery {
            event_types: vec!["USER_CREATED".into(), "USER_DELETED".into()],
            processed: Some(false),
            ..EventQuery::default()
        };
        let (clause, values) = build_event_filter(&params);
        assert_eq!(clause, "WHERE event_type IN (?, ?) AND processed = ?");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn empty_filter_has_no_where_clause() {
        let (clause, values) = build_event_filter(&EventQuery::default());
        assert!(clause.is_empty());
        assert!(values.is_empty());
    }
}
