//! Integration tests for `EventStore` on top of an in-memory database.

mod common;

use chrono::{Duration, Utc};
use modular_core::event::{EventPriority, NewEvent};
use modular_core::event_schema::validate_and_normalize;
use modular_db::models::event::{EventQuery, PurgeCriteria};
use serde_json::json;

use common::test_store;

fn event(event_type: &str, age_minutes: i64) -> modular_core::event::Event {
    validate_and_normalize(
        NewEvent::new(event_type, "tests", json!({}))
            .with_timestamp(Utc::now() - Duration::minutes(age_minutes)),
    )
    .unwrap()
}

#[tokio::test]
async fn append_is_an_idempotent_upsert() {
    let store = test_store().await;
    let mut e = event("DATA_CREATED", 0);

    store.append(&e).await.unwrap();
    e.data = json!({"entity_id": "x"});
    store.append(&e).await.unwrap();

    assert_eq!(store.stats().await.total_events, 1);
    assert_eq!(store.get(&e.id).await.unwrap().data["entity_id"], "x");
}

#[tokio::test]
async fn mark_processed_reports_missing_events() {
    let store = test_store().await;
    let e = event("DATA_CREATED", 0);
    store.append(&e).await.unwrap();

    assert!(store.mark_processed(&e.id).await);
    assert!(!store.mark_processed("missing").await);
    assert!(store.get(&e.id).await.unwrap().processed);
}

#[tokio::test]
async fn unprocessed_lists_pending_events_newest_first() {
    let store = test_store().await;
    let old = event("USER_CREATED", 10);
    let new = event("USER_UPDATED", 1);
    let done = event("USER_DELETED", 0);
    for e in [&old, &new, &done] {
        store.append(e).await.unwrap();
    }
    store.mark_processed(&done.id).await;

    let pending: Vec<_> = store
        .unprocessed(10)
        .await
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(pending, vec![new.id.clone(), old.id.clone()]);

    assert_eq!(store.unprocessed(1).await.len(), 1);
}

#[tokio::test]
async fn query_and_count_agree_on_filters() {
    let store = test_store().await;
    for t in ["USER_LOGIN", "USER_LOGIN", "USER_LOGOUT"] {
        store.append(&event(t, 0)).await.unwrap();
    }

    let params = EventQuery {
        event_types: vec!["USER_LOGIN".into()],
        limit: Some(1),
        ..EventQuery::default()
    };
    assert_eq!(store.query(&params).await.len(), 1);
    assert_eq!(store.count(&params).await, 2);
}

#[tokio::test]
async fn stats_split_processed_and_priority() {
    let store = test_store().await;
    let mut urgent = event("SYSTEM_ERROR", 0);
    urgent.priority = EventPriority::Critical;
    let routine = event("SYSTEM_STARTUP", 0);
    store.append(&urgent).await.unwrap();
    store.append(&routine).await.unwrap();
    store.mark_processed(&routine.id).await;

    let stats = store.stats().await;
    assert_eq!(stats.total_events, 2);
    assert_eq!(stats.processed_events, 1);
    assert_eq!(stats.unprocessed_events, 1);
    assert_eq!(stats.events_by_priority["critical"], 1);
    assert_eq!(stats.events_by_priority["normal"], 1);
    assert_eq!(stats.events_by_type["SYSTEM_ERROR"], 1);
}

#[tokio::test]
async fn purge_keeps_pending_events_by_default() {
    let store = test_store().await;
    let stale_done = event("DATA_DELETED", 120);
    let stale_pending = event("DATA_DELETED", 120);
    let fresh_done = event("DATA_DELETED", 0);
    for e in [&stale_done, &stale_pending, &fresh_done] {
        store.append(e).await.unwrap();
    }
    store.mark_processed(&stale_done.id).await;
    store.mark_processed(&fresh_done.id).await;

    let purged = store
        .purge(&PurgeCriteria {
            older_than: Some(Utc::now() - Duration::minutes(60)),
            ..PurgeCriteria::default()
        })
        .await;

    assert_eq!(purged, 1);
    assert!(store.get(&stale_done.id).await.is_none());
    assert!(store.get(&stale_pending.id).await.is_some());
    assert!(store.get(&fresh_done.id).await.is_some());
}
