//! Tests for the storage facade, coalescer, and stability gate plumbing.

mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tideway::core::error::Tier;
use tideway::record::{GatedRecordReader, RecordCoalescer, StabilityGate};
use tideway::storage::{MemoryStore, RecordDocument, RecordStore, StorageFacade};

fn facade(
    cache: &Arc<MemoryStore>,
    storage: &Arc<MemoryStore>,
    exclusions: &[&str],
) -> Arc<StorageFacade> {
    Arc::new(StorageFacade::new(
        cache.clone(),
        storage.clone(),
        exclusions.iter().map(|p| p.to_string()).collect(),
    ))
}

// ============================================================================
// Facade tests
// ============================================================================

#[tokio::test]
async fn load_prefers_the_cache_tier() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &[]);

    cache
        .set("a/1", RecordDocument::new(3, json!({"from": "cache"})))
        .await
        .unwrap();
    storage
        .set("a/1", RecordDocument::new(2, json!({"from": "storage"})))
        .await
        .unwrap();

    let loaded = facade.load("a/1").await.unwrap().unwrap();
    assert_eq!(loaded.data, json!({"from": "cache"}));
}

#[tokio::test]
async fn load_falls_through_to_durable_storage() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &[]);

    storage
        .set("a/1", RecordDocument::new(2, json!({"from": "storage"})))
        .await
        .unwrap();

    let loaded = facade.load("a/1").await.unwrap().unwrap();
    assert_eq!(loaded.version, 2);

    assert!(facade.load("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn excluded_names_skip_the_durable_tier_entirely() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &["tmp/"]);

    assert!(facade.is_excluded("tmp/x"));
    assert!(!facade.is_excluded("a/tmp/x")); // prefix, not substring

    facade
        .storage_set("tmp/x", RecordDocument::fresh())
        .await
        .unwrap();
    assert!(facade.load("tmp/x").await.unwrap().is_none());
    facade.storage_delete("tmp/x").await.unwrap();

    assert_eq!(storage.operation_count(), 0);
}

#[tokio::test]
async fn errors_carry_the_failing_tier() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &[]);

    cache.fail_with("cache boom");
    let err = facade.cache_get("a/1").await.unwrap_err();
    assert_eq!(err.tier(), Some(Tier::Cache));
    cache.heal();

    storage.fail_with("storage boom");
    let err = facade
        .storage_set("a/1", RecordDocument::fresh())
        .await
        .unwrap_err();
    assert_eq!(err.tier(), Some(Tier::Storage));
    assert!(err.wire_form().contains("storage boom"));
}

// ============================================================================
// Coalescer tests
// ============================================================================

#[tokio::test]
async fn concurrent_loads_share_one_backend_fetch() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &[]);
    let coalescer = Arc::new(RecordCoalescer::new(facade));

    cache
        .set("a/1", RecordDocument::new(1, json!({"x": 1})))
        .await
        .unwrap();
    cache.set_latency(Duration::from_millis(20));

    let (first, second, third) = tokio::join!(
        coalescer.load("a/1"),
        coalescer.load("a/1"),
        coalescer.load("a/1"),
    );

    assert_eq!(first.unwrap().unwrap().version, 1);
    assert_eq!(second.unwrap().unwrap().version, 1);
    assert_eq!(third.unwrap().unwrap().version, 1);
    assert_eq!(cache.operation_count(), 2); // seed set + one coalesced get
}

#[tokio::test]
async fn coalesced_error_reaches_every_waiter() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &[]);
    let coalescer = Arc::new(RecordCoalescer::new(facade));

    cache.fail_with("cache boom");
    cache.set_latency(Duration::from_millis(10));

    let (first, second) = tokio::join!(coalescer.load("a/1"), coalescer.load("a/1"));
    assert!(first.is_err());
    assert!(second.is_err());
}

#[tokio::test]
async fn miss_in_both_tiers_is_not_an_error() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let coalescer = RecordCoalescer::new(facade(&cache, &storage, &[]));

    assert!(coalescer.load("missing").await.unwrap().is_none());
}

// ============================================================================
// Gated reader tests
// ============================================================================

#[tokio::test]
async fn gated_reads_queue_behind_in_flight_requests() {
    let cache = Arc::new(MemoryStore::new());
    let storage = Arc::new(MemoryStore::new());
    let facade = facade(&cache, &storage, &[]);
    let coalescer = Arc::new(RecordCoalescer::new(Arc::clone(&facade)));
    let gate = Arc::new(StabilityGate::new());
    let reader = GatedRecordReader::new(Arc::clone(&gate), coalescer);

    cache
        .set("a/1", RecordDocument::new(1, json!({"x": 1})))
        .await
        .unwrap();
    cache.set_latency(Duration::from_millis(15));

    // Two rule reads race: the second queues behind the first and both see
    // the same committed state.
    let (first, second) = tokio::join!(reader.read("a/1"), reader.read("a/1"));
    assert_eq!(first.unwrap().unwrap().version, 1);
    assert_eq!(second.unwrap().unwrap().version, 1);

    // Both completions released their gate entry.
    assert!(gate.is_idle("a/1"));
}
