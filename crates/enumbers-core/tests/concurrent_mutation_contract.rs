//! Contract Test: Concurrent Mutation
//!
//! Constraints verified:
//! - Manual edits made while a reconciliation is fetching survive the merge
//! - The merge is applied to the collection as it is when the fetch returns
//! - After concurrent activity, memory equals the persisted document

mod common;

use common::*;
use enumbers_core::storage::decode_collection;
use enumbers_core::{Reconciler, RecordStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

const CREATED: [&str; 10] = [
    "E200", "E201", "E202", "E203", "E204", "E205", "E206", "E207", "E208", "E209",
];

async fn wait_for_fetch(catalog: &ScriptedCatalog) {
    while catalog.fetch_call_count() == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn edits_during_fetch_are_kept_by_the_merge() {
    let (store, storage) = store_with(r#"[{"code":"E330","name":"Citric acid"}]"#).await;
    let catalog = Arc::new(
        ScriptedCatalog::new(vec![entry("E330", "Citric acid"), entry("E100", "Curcumin")])
            .with_fetch_gate(),
    );
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), catalog.clone()));

    let running = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.reconcile().await }
    });
    wait_for_fetch(&catalog).await;

    // The store stays usable while the catalog is slow
    store.create("E200", "Sorbic acid").await.unwrap();
    store.update("E330", "Citric acid (anhydrous)").await.unwrap();

    catalog.release_fetch();
    let report = running.await.unwrap().unwrap();

    assert_eq!(report.matched, 1);
    assert_eq!(report.flagged_removed, 1, "E200 existed when the merge ran");
    assert_eq!(report.added, 1);

    let e330 = store.find("E330").await.unwrap();
    assert_eq!(e330.name, "Citric acid (anhydrous)");
    assert!(e330.external_additive.is_some());
    assert!(store.find("E200").await.unwrap().is_removed());
    assert!(store.find("E100").await.is_some());

    assert_eq!(
        decode_collection(&storage.document().await.unwrap()),
        store.snapshot().await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_and_reconcile_lose_nothing() {
    let (store, storage) = store_with(r#"[{"code":"E330","name":"Citric acid"}]"#).await;
    let catalog = Arc::new(
        ScriptedCatalog::new(vec![entry("E330", "Citric acid"), entry("E100", "Curcumin")])
            .with_fetch_delay(Duration::from_millis(20)),
    );
    let reconciler = Arc::new(Reconciler::new(Arc::clone(&store), catalog));

    let mut tasks = JoinSet::new();
    tasks.spawn({
        let reconciler = Arc::clone(&reconciler);
        async move {
            reconciler.reconcile().await.unwrap();
        }
    });
    for code in CREATED {
        let store: Arc<RecordStore> = Arc::clone(&store);
        tasks.spawn(async move {
            store.create(code, "Created concurrently").await.unwrap();
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    let records = store.snapshot().await;
    for code in CREATED {
        assert!(
            records.iter().any(|r| r.code == code),
            "{} missing after concurrent reconcile",
            code
        );
    }
    let e330 = store.find("E330").await.unwrap();
    assert!(e330.external_additive.is_some());
    assert_eq!(e330.removed, None);
    assert!(store.find("E100").await.unwrap().external_additive.is_some());
    assert_eq!(records.len(), CREATED.len() + 2);

    assert_eq!(decode_collection(&storage.document().await.unwrap()), records);
}
