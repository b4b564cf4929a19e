#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use modular_events::{callback, BusConfig, Callback, EventBus, EventStore};

/// How long `wait_until` keeps polling before failing the test.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A store over a fresh, migrated in-memory database.
pub async fn test_store() -> EventStore {
    let pool = modular_db::create_memory_pool().await.unwrap();
    modular_db::run_migrations(&pool).await.unwrap();
    EventStore::new(pool)
}

/// A persisted bus that has not been started yet.
pub async fn idle_bus() -> (Arc<EventBus>, EventStore) {
    let store = test_store().await;
    let bus = Arc::new(EventBus::with_store(BusConfig::default(), store.clone()));
    (bus, store)
}

/// A persisted, running bus.
pub async fn started_bus() -> (Arc<EventBus>, EventStore) {
    let (bus, store) = idle_bus().await;
    assert!(bus.start());
    (bus, store)
}

/// A callback that bumps `counter` every time it runs.
pub fn counting(counter: &Arc<AtomicUsize>) -> Callback {
    let counter = Arc::clone(counter);
    callback(move |_event| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {WAIT_TIMEOUT:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the stored event `id` is flagged processed.
pub async fn wait_processed(store: &EventStore, id: &str) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        if store.get(id).await.is_some_and(|e| e.processed) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "event {id} not processed within {WAIT_TIMEOUT:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Give spawned tasks a chance to run when asserting that something did
/// NOT happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
