/// Persistence tests
///
/// Snapshot-backed stores and services surviving a reopen.
/// Run with: cargo test --test persistence_tests

use std::sync::Arc;

use std::path::Path;

use product_catalog::storage::Collection;
use product_catalog::{
    CatalogConfig, CatalogError, Category, DocumentStore, ImageUpload, InMemoryFileStore,
    NewProduct, Product, ProductService,
};
use tempfile::TempDir;

fn request(name: &str) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        description: "persisted".to_string(),
        price_cents: 1200,
        quantity: 3,
        category: Category::Beauty,
        popular: false,
        similar_products: Vec::new(),
    }
}

async fn snapshot_service(path: &Path) -> (ProductService, Arc<InMemoryFileStore>) {
    let files = Arc::new(InMemoryFileStore::new());
    let store = DocumentStore::open(path).await.unwrap();
    let service =
        ProductService::new(Arc::new(store), files.clone(), CatalogConfig::default()).unwrap();
    (service, files)
}

/// Put a directory where the snapshot goes so the next commit cannot be written.
async fn block_snapshot(path: &Path) {
    if tokio::fs::try_exists(path).await.unwrap() {
        tokio::fs::remove_file(path).await.unwrap();
    }
    tokio::fs::create_dir(path).await.unwrap();
}

#[tokio::test]
async fn test_unwritable_snapshot_fails_create_before_uploads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.snapshot");
    let (service, files) = snapshot_service(&path).await;
    block_snapshot(&path).await;

    let result = service
        .create_product(
            request("Lotion"),
            vec![ImageUpload::new("lotion.png", "image/png", vec![3; 8])],
        )
        .await;

    assert!(matches!(result, Err(CatalogError::Transaction(_))));
    assert_eq!(service.store().version().await, 0);
    assert_eq!(service.store().collection_len(Collection::Products).await, 0);
    assert_eq!(service.store().collection_len(Collection::Images).await, 0);
    assert!(files.is_empty().await);
    assert_eq!(service.store().transaction_stats().active, 0);
}

#[tokio::test]
async fn test_unwritable_snapshot_fails_delete_image_and_keeps_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.snapshot");
    let (service, files) = snapshot_service(&path).await;

    let product = service
        .create_product(
            request("Comb"),
            vec![
                ImageUpload::new("front.png", "image/png", vec![1; 4]),
                ImageUpload::new("back.png", "image/png", vec![2; 4]),
            ],
        )
        .await
        .unwrap()
        .into_strict()
        .unwrap();
    let doomed = service.get_image(product.images[0]).await.unwrap();
    let version = service.store().version().await;

    block_snapshot(&path).await;
    let result = service.delete_image(product.id, doomed.id).await;

    assert!(matches!(result, Err(CatalogError::Transaction(_))));
    assert_eq!(service.store().version().await, version);
    assert_eq!(service.get_product(product.id).await.unwrap().images, product.images);
    assert!(service.get_image(doomed.id).await.is_ok());
    assert!(files.get(&doomed.path).await.is_some());
    assert_eq!(files.len().await, 2);
}

#[tokio::test]
async fn test_service_reopens_from_data_dir() {
    let dir = TempDir::new().unwrap();
    let config = CatalogConfig::default().data_dir(dir.path());

    let (first, second) = {
        let service = ProductService::open(config.clone()).await.unwrap();
        let first = service
            .create_product(
                request("Soap"),
                vec![ImageUpload::new("soap.png", "image/png", vec![7; 16])],
            )
            .await
            .unwrap()
            .into_strict()
            .unwrap();
        let second = service
            .create_product(
                NewProduct {
                    similar_products: vec![first.id],
                    ..request("Shampoo")
                },
                vec![ImageUpload::new("shampoo.gif", "image/gif", vec![1; 4])],
            )
            .await
            .unwrap()
            .into_value();
        (first, second)
    };

    assert!(dir.path().join("catalog.snapshot").exists());

    let reopened = ProductService::open(config).await.unwrap();
    let loaded = reopened.get_product(first.id).await.unwrap();
    assert_eq!(loaded.name, "Soap");
    assert_eq!(loaded.similar_products, vec![second.id]);

    let image = reopened.get_image(loaded.images[0]).await.unwrap();
    let bytes = tokio::fs::read(dir.path().join("files").join(&image.path))
        .await
        .unwrap();
    assert_eq!(bytes, vec![7; 16]);
}

#[tokio::test]
async fn test_store_snapshot_keeps_versions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.snapshot");

    let product = {
        let store = Arc::new(DocumentStore::open(&path).await.unwrap());
        let mut session = store.begin().unwrap();
        let now = chrono::Utc::now();
        let product = Product {
            id: product_catalog::ProductId::new(),
            name: "Brush".to_string(),
            description: "bristles".to_string(),
            price_cents: 300,
            quantity: 9,
            category: Category::Beauty,
            popular: true,
            images: Vec::new(),
            similar_products: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        session.save(product.clone()).unwrap();
        session.commit().await.unwrap();
        store.save(product.clone()).await.unwrap();
        assert_eq!(store.version().await, 2);
        product
    };

    let reopened = DocumentStore::open(&path).await.unwrap();
    assert_eq!(reopened.version().await, 2);
    assert_eq!(reopened.collection_len(Collection::Products).await, 1);
    assert_eq!(
        reopened.find_by_id::<Product>(product.id).await.unwrap(),
        Some(product)
    );
}

#[tokio::test]
async fn test_open_without_snapshot_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = DocumentStore::open(dir.path().join("missing.snapshot"))
        .await
        .unwrap();
    assert_eq!(store.version().await, 0);
    assert_eq!(store.collection_len(Collection::Images).await, 0);
}
