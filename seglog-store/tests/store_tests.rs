//! # Store Tests
//!
//! Put/get/delete semantics, segment rollover, and the concurrency
//! guarantees of the single-writer / many-readers design.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::sleep;

use seglog_core::{Error, StoreConfig};
use seglog_store::Store;

/// Encoded size of a record with a 1-byte key and 2-byte value.
const SMALL_RECORD: u64 = 15;

async fn open_store(dir: &TempDir, segment_size: u64) -> Store {
    Store::open(StoreConfig::new(dir.path(), segment_size))
        .await
        .unwrap()
}

async fn wait_for_segment_count(store: &Store, expected: usize) {
    for _ in 0..100 {
        if store.segment_count().await.unwrap() == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "segment count never reached {expected}, still at {}",
        store.segment_count().await.unwrap()
    );
}

#[tokio::test]
async fn put_and_get_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 45).await;

    let pairs = [("1", "v1"), ("2", "v2"), ("3", "v3")];
    for (key, value) in pairs {
        store.put(key, value).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), value);
    }

    // Three 15-byte records fit exactly in the 45-byte cap: one segment.
    assert_eq!(store.segment_count().await.unwrap(), 1);
    let first = dir.path().join("current-data0");
    assert_eq!(std::fs::metadata(&first).unwrap().len(), 3 * SMALL_RECORD);

    // Re-putting the same pairs rolls over instead of growing the sealed
    // file; the values must still read back correctly.
    for (key, value) in pairs {
        store.put(key, value).await.unwrap();
    }
    assert_eq!(std::fs::metadata(&first).unwrap().len(), 3 * SMALL_RECORD);
    for (key, value) in pairs {
        assert_eq!(store.get(key).await.unwrap(), value);
    }

    store.close().await.unwrap();
}

#[tokio::test]
async fn rollover_at_segment_cap() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 35).await;

    store.put("1", "v1").await.unwrap();
    store.put("2", "v2").await.unwrap();
    store.put("3", "v3").await.unwrap();
    store.put("2", "v5").await.unwrap();

    assert_eq!(store.segment_count().await.unwrap(), 2);
    assert_eq!(store.get("2").await.unwrap(), "v5");

    store.close().await.unwrap();
}

#[tokio::test]
async fn newest_value_wins() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 1024).await;

    store.put("k", "v1").await.unwrap();
    store.put("k", "v2").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), "v2");

    store.close().await.unwrap();
}

#[tokio::test]
async fn delete_tombstones_key() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 1024).await;

    store.put("key1", "value1").await.unwrap();
    store.put("key2", "value2").await.unwrap();
    store.put("key3", "value3").await.unwrap();
    store.delete("key2").await.unwrap();

    assert!(matches!(store.get("key2").await, Err(Error::NotFound)));
    assert_eq!(store.get("key1").await.unwrap(), "value1");

    // The key can come back.
    store.put("key2", "value2b").await.unwrap();
    assert_eq!(store.get("key2").await.unwrap(), "value2b");

    store.close().await.unwrap();
}

#[tokio::test]
async fn delete_of_absent_key_succeeds() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 1024).await;

    store.delete("never-existed").await.unwrap();
    assert!(matches!(
        store.get("never-existed").await,
        Err(Error::NotFound)
    ));

    store.close().await.unwrap();
}

#[tokio::test]
async fn get_of_missing_key_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 1024).await;

    assert!(matches!(store.get("missing").await, Err(Error::NotFound)));

    store.close().await.unwrap();
}

#[tokio::test]
async fn tombstone_value_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 1024).await;

    assert!(matches!(
        store.put("k", "DELETE").await,
        Err(Error::ReservedValue(_))
    ));
    assert!(matches!(store.get("k").await, Err(Error::NotFound)));

    store.close().await.unwrap();
}

#[tokio::test]
async fn oversized_record_gets_its_own_segment() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 35).await;

    // 12 + 3 + 40 = 55 bytes, well past the cap; a fresh segment takes it.
    let big = "x".repeat(40);
    store.put("big", &big).await.unwrap();
    assert_eq!(store.segment_count().await.unwrap(), 1);
    assert_eq!(store.get("big").await.unwrap(), big);

    // The next record cannot share that overflowing segment.
    store.put("1", "v1").await.unwrap();
    assert_eq!(store.segment_count().await.unwrap(), 2);
    assert_eq!(store.get("1").await.unwrap(), "v1");

    store.close().await.unwrap();
}

#[tokio::test]
async fn operations_after_close_fail() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir, 1024).await;

    store.put("k", "v").await.unwrap();
    store.close().await.unwrap();

    assert!(matches!(store.put("k", "v2").await, Err(Error::Closed)));
    assert!(matches!(store.get("k").await, Err(Error::Closed)));
    assert!(matches!(store.delete("k").await, Err(Error::Closed)));

    // Close is idempotent.
    store.close().await.unwrap();
}

#[tokio::test]
async fn concurrent_writers_read_their_writes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(&dir, 512).await);

    let mut handles = Vec::new();
    for writer in 0..10u32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for i in 0..20u32 {
                let key = format!("w{writer}-k{i}");
                let value = format!("w{writer}-v{i}");
                store.put(&key, &value).await.unwrap();
                // Read-your-writes: the index update is published before
                // the put reply.
                assert_eq!(store.get(&key).await.unwrap(), value);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Rollovers happened along the way; compaction keeps the list bounded.
    wait_for_segment_count(&store, 2).await;
    for writer in 0..10u32 {
        for i in 0..20u32 {
            let key = format!("w{writer}-k{i}");
            assert_eq!(store.get(&key).await.unwrap(), format!("w{writer}-v{i}"));
        }
    }

    store.close().await.unwrap();
}
