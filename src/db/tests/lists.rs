use crate::db::*;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_list_is_fifo_and_keyed() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert_eq!(db.list_push("queue", "a").await.unwrap(), 1);
    assert_eq!(db.list_push("queue", "b").await.unwrap(), 2);
    assert_eq!(db.list_push("other", "x").await.unwrap(), 1);

    assert_eq!(db.list_range("queue", None).await.unwrap(), vec!["a", "b"]);
    assert_eq!(db.list_range("queue", Some(1)).await.unwrap(), vec!["a"]);

    assert_eq!(db.list_pop("queue").await.unwrap().as_deref(), Some("a"));
    assert_eq!(db.list_pop("queue").await.unwrap().as_deref(), Some("b"));
    assert_eq!(db.list_pop("queue").await.unwrap(), None);
    assert_eq!(db.list_len("other").await.unwrap(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_concurrent_pops_deliver_each_entry_once() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    for i in 0..20 {
        db.list_push("queue", &i.to_string()).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let mut got = Vec::new();
            while let Some(payload) = db.list_pop("queue").await.unwrap() {
                got.push(payload);
            }
            got
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.await.unwrap());
    }
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), 20);
    assert_eq!(unique.len(), 20);

    db.close().await;
}

#[tokio::test]
async fn test_blocking_pop_times_out_on_empty_list() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let started = Instant::now();
    let popped = db
        .blocking_pop("queue", Duration::from_millis(200), Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(popped, None);
    assert!(started.elapsed() >= Duration::from_millis(200));

    db.close().await;
}

#[tokio::test]
async fn test_blocking_pop_accepts_unbounded_timeout() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let producer = db.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        producer.list_push("queue", "eventually").await.unwrap();
    });

    let popped = db
        .blocking_pop("queue", Duration::MAX, Duration::from_millis(20))
        .await
        .unwrap();
    assert_eq!(popped.as_deref(), Some("eventually"));

    db.close().await;
}

#[tokio::test]
async fn test_blocking_pop_receives_late_push() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let producer = db.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        producer.list_push("queue", "late").await.unwrap();
    });

    let popped = db
        .blocking_pop("queue", Duration::from_secs(5), Duration::from_millis(20))
        .await
        .unwrap();
    assert_eq!(popped.as_deref(), Some("late"));

    db.close().await;
}
