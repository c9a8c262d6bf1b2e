//! Reconciliation against a real SQLite file, including concurrent writers.

use std::sync::Arc;

use linkwise_config::StoreConfig;
use linkwise_core::{ContactId, ContactStore, Observation};
use linkwise_engine::Reconciler;
use linkwise_store::SqliteStore;
use tempfile::TempDir;

async fn sqlite_reconciler() -> (Reconciler, Arc<SqliteStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("contacts.db").display());
    let store = Arc::new(SqliteStore::open(&url, &StoreConfig::default()).await.unwrap());
    (Reconciler::new(store.clone()), store, dir)
}

fn observe(email: Option<&str>, phone: Option<&str>) -> Observation {
    Observation::new(email.map(String::from), phone.map(String::from)).unwrap()
}

#[tokio::test]
async fn scenario_persists_through_sqlite() {
    let (r, store, _dir) = sqlite_reconciler().await;

    r.reconcile(observe(Some("a@x.com"), Some("111"))).await.unwrap();
    r.reconcile(observe(Some("b@x.com"), Some("111"))).await.unwrap();
    r.reconcile(observe(Some("c@x.com"), Some("333"))).await.unwrap();
    let merged = r
        .reconcile(observe(Some("c@x.com"), Some("111")))
        .await
        .unwrap();

    assert_eq!(merged.view.primary_contact_id, ContactId(1));
    assert_eq!(merged.view.emails, vec!["a@x.com", "b@x.com", "c@x.com"]);
    assert_eq!(merged.view.phone_numbers, vec!["111", "333"]);
    assert_eq!(merged.view.secondary_contact_ids, vec![ContactId(2), ContactId(3)]);
    assert_eq!(merged.demoted, vec![ContactId(3)]);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn new_email_links_through_a_secondary_phone_on_sqlite() {
    let (r, store, _dir) = sqlite_reconciler().await;

    let one = r.reconcile(observe(Some("a@x.com"), Some("111"))).await.unwrap();
    assert!(one.created);
    assert_eq!(one.view.primary_contact_id, ContactId(1));

    let two = r.reconcile(observe(Some("a@x.com"), Some("222"))).await.unwrap();
    assert_eq!(two.view.phone_numbers, vec!["111", "222"]);
    assert_eq!(two.view.secondary_contact_ids, vec![ContactId(2)]);

    let three = r.reconcile(observe(Some("b@y.com"), Some("222"))).await.unwrap();
    assert_eq!(three.inserted, Some(ContactId(3)));
    assert_eq!(three.view.primary_contact_id, ContactId(1));
    assert_eq!(three.view.emails, vec!["a@x.com", "b@y.com"]);
    assert_eq!(three.view.phone_numbers, vec!["111", "222"]);
    assert_eq!(three.view.secondary_contact_ids, vec![ContactId(2), ContactId(3)]);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn reopened_store_sees_committed_clusters() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("contacts.db").display());

    {
        let store = Arc::new(SqliteStore::open(&url, &StoreConfig::default()).await.unwrap());
        let r = Reconciler::new(store);
        r.reconcile(observe(Some("a@x.com"), None)).await.unwrap();
        r.reconcile(observe(Some("a@x.com"), Some("111"))).await.unwrap();
    }

    let store = Arc::new(SqliteStore::open(&url, &StoreConfig::default()).await.unwrap());
    let r = Reconciler::new(store);
    let out = r.reconcile(observe(None, Some("111"))).await.unwrap();
    assert_eq!(out.view.primary_contact_id, ContactId(1));
    assert_eq!(out.view.secondary_contact_ids, vec![ContactId(2)]);
    assert!(!out.created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_new_email_creates_one_primary() {
    let (r, store, _dir) = sqlite_reconciler().await;
    let r = Arc::new(r);

    let calls = (0..12).map(|_| {
        let r = Arc::clone(&r);
        tokio::spawn(async move { r.reconcile(observe(Some("race@x.com"), None)).await })
    });
    let outcomes: Vec<_> = futures::future::join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.created).count(), 1);
    assert!(
        outcomes
            .iter()
            .all(|o| o.view.primary_contact_id == outcomes[0].view.primary_contact_id)
    );
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_reconcilers_are_serialized_by_the_database() {
    // Two reconcilers share no key locks; only the store transaction protects them.
    let (first, store, _dir) = sqlite_reconciler().await;
    let first = Arc::new(first);
    let second = Arc::new(Reconciler::new(store.clone()));

    let calls = (0..10).map(|i| {
        let r = if i % 2 == 0 {
            Arc::clone(&first)
        } else {
            Arc::clone(&second)
        };
        tokio::spawn(async move { r.reconcile(observe(Some("shared@x.com"), Some("555"))).await })
    });
    for joined in futures::future::join_all(calls).await {
        assert_eq!(joined.unwrap().unwrap().view.primary_contact_id, ContactId(1));
    }
    assert_eq!(store.count().await.unwrap(), 1);
}
