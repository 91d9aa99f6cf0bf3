/// Transaction tests
///
/// Session semantics of the document store: commit, abort, auto-abort on
/// drop, read-your-writes and write-write conflict detection.
/// Run with: cargo test --test transaction_tests

use std::sync::Arc;

use chrono::Utc;
use product_catalog::storage::Collection;
use product_catalog::transaction::TransactionState;
use product_catalog::{CatalogError, Category, DocumentStore, Product, ProductId};

fn product(name: &str) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::new(),
        name: name.to_string(),
        description: "transaction test".to_string(),
        price_cents: 100,
        quantity: 1,
        category: Category::Sports,
        popular: false,
        images: Vec::new(),
        similar_products: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn test_commit_publishes_all_writes() {
    let store = Arc::new(DocumentStore::new());
    let (a, b) = (product("a"), product("b"));

    let mut session = store.begin().unwrap();
    session.save(a.clone()).unwrap();
    session.save(b.clone()).unwrap();
    assert_eq!(session.pending_changes(), 2);

    // Not visible outside the session yet
    assert!(store.find_by_id::<Product>(a.id).await.unwrap().is_none());
    assert!(session.find::<Product>(a.id).await.unwrap().is_some());

    session.commit().await.unwrap();
    assert_eq!(session.state(), TransactionState::Committed);
    session.end();

    assert_eq!(store.collection_len(Collection::Products).await, 2);
    assert_eq!(store.version().await, 1);
}

#[tokio::test]
async fn test_abort_discards_writes() {
    let store = Arc::new(DocumentStore::new());
    let a = product("a");

    let mut session = store.begin().unwrap();
    session.save(a.clone()).unwrap();
    session.abort();
    assert_eq!(session.state(), TransactionState::Aborted);

    // Finished sessions refuse further work
    assert!(matches!(
        session.commit().await,
        Err(CatalogError::Transaction(_))
    ));
    session.end();

    assert!(store.find_by_id::<Product>(a.id).await.unwrap().is_none());
    assert_eq!(store.transaction_stats().aborted, 1);
}

#[tokio::test]
async fn test_drop_aborts_active_session() {
    let store = Arc::new(DocumentStore::new());
    let a = product("a");

    {
        let mut session = store.begin().unwrap();
        session.save(a.clone()).unwrap();
        assert_eq!(store.transaction_stats().active, 1);
    }

    let stats = store.transaction_stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.aborted, 1);
    assert!(store.find_by_id::<Product>(a.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_inside_session() {
    let store = Arc::new(DocumentStore::new());
    let a = product("a");
    store.save(a.clone()).await.unwrap();

    let mut session = store.begin().unwrap();
    session.delete_one(&a).unwrap();
    assert!(session.find::<Product>(a.id).await.unwrap().is_none());
    assert!(store.find_by_id::<Product>(a.id).await.unwrap().is_some());

    session.commit().await.unwrap();
    assert!(store.find_by_id::<Product>(a.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_write_write_conflict() {
    let store = Arc::new(DocumentStore::new());
    let a = product("a");
    store.save(a.clone()).await.unwrap();

    let mut first = store.begin().unwrap();
    let mut second = store.begin().unwrap();

    let mut from_first = first.find::<Product>(a.id).await.unwrap().unwrap();
    let mut from_second = second.find::<Product>(a.id).await.unwrap().unwrap();

    from_first.quantity = 10;
    first.save(from_first).unwrap();
    first.commit().await.unwrap();

    from_second.quantity = 20;
    second.save(from_second).unwrap();
    let result = second.commit().await;
    assert!(matches!(result, Err(CatalogError::Transaction(_))));
    assert_eq!(second.state(), TransactionState::Aborted);

    let stored = store.find_by_id::<Product>(a.id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 10);
}

#[tokio::test]
async fn test_conflict_on_concurrent_insert() {
    let store = Arc::new(DocumentStore::new());
    let a = product("a");

    let mut session = store.begin().unwrap();
    assert!(session.find::<Product>(a.id).await.unwrap().is_none());

    // Someone else creates the document the session saw as absent
    store.save(a.clone()).await.unwrap();

    session.save(a.clone()).unwrap();
    assert!(matches!(
        session.commit().await,
        Err(CatalogError::Transaction(_))
    ));
}

#[tokio::test]
async fn test_concurrent_sessions_on_disjoint_documents() {
    let store = Arc::new(DocumentStore::new());

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let mut session = store.begin().unwrap();
            session.save(product(&format!("p{}", i))).unwrap();
            session.commit().await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.collection_len(Collection::Products).await, 8);
    let stats = store.transaction_stats();
    assert_eq!(stats.committed, 8);
    assert_eq!(stats.active, 0);
}
