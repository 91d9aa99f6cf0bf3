/// Side effect tests
///
/// File store failures after commit: degraded outcomes, strict conversion
/// and replay through retry_side_effects.
/// Run with: cargo test --test side_effect_tests

use std::sync::Arc;

use product_catalog::files::StoredFile;
use product_catalog::{
    CatalogConfig, CatalogError, Category, DocumentStore, FileOperation, FileStore, ImageUpload,
    InMemoryFileStore, NewProduct, ProductService, SideEffectError,
};

fn setup(concurrency: usize) -> (ProductService, Arc<InMemoryFileStore>) {
    let files = Arc::new(InMemoryFileStore::new());
    let service = ProductService::new(
        Arc::new(DocumentStore::new()),
        files.clone(),
        CatalogConfig::default().upload_concurrency(concurrency),
    )
    .unwrap();
    (service, files)
}

fn request() -> NewProduct {
    NewProduct {
        name: "Kettle".to_string(),
        description: "Boils water".to_string(),
        price_cents: 3499,
        quantity: 10,
        category: Category::Home,
        popular: true,
        similar_products: Vec::new(),
    }
}

fn uploads(count: u8) -> Vec<ImageUpload> {
    (0..count)
        .map(|i| ImageUpload::new(format!("k{}.webp", i), "image/webp", vec![i + 1; 4]))
        .collect()
}

#[tokio::test]
async fn test_failed_uploads_keep_committed_documents() {
    let (service, files) = setup(1);
    files.fail_uploads(true).await;

    let outcome = service.create_product(request(), uploads(2)).await.unwrap();
    assert!(outcome.is_degraded());
    assert_eq!(outcome.side_effects().len(), 2);
    for failure in outcome.side_effects() {
        assert!(matches!(failure.operation, FileOperation::Upload(_)));
    }

    let product = outcome.value().clone();
    let stored = service.get_product(product.id).await.unwrap();
    assert_eq!(stored.images.len(), 2);
    for image_id in &stored.images {
        assert!(service.get_image(*image_id).await.is_ok());
    }
    assert!(files.is_empty().await);
}

#[tokio::test]
async fn test_retry_returns_operations_that_fail_again() {
    let (service, files) = setup(3);

    let outcome = service.create_product(request(), uploads(3)).await.unwrap();
    assert!(!outcome.is_degraded());
    assert_eq!(files.len().await, 3);

    let product = outcome.into_value();
    let victim = service.get_image(product.images[1]).await.unwrap().path;
    files.delete(&victim).await.unwrap();
    files.fail_path(victim.clone()).await;

    let failures = service
        .retry_side_effects(vec![SideEffectError::new(
            FileOperation::Upload(StoredFile::new(
                victim.clone(),
                "image/webp",
                vec![2; 4],
            )),
            "lost",
        )])
        .await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path(), victim);
    assert_eq!(files.len().await, 2);
}

#[tokio::test]
async fn test_retry_completes_failed_uploads() {
    let (service, files) = setup(2);
    files.fail_uploads(true).await;

    let (product, failures) = service
        .create_product(request(), uploads(3))
        .await
        .unwrap()
        .into_parts();
    assert_eq!(failures.len(), 3);

    files.clear_faults().await;
    let remaining = service.retry_side_effects(failures).await;
    assert!(remaining.is_empty());

    for image_id in &product.images {
        let image = service.get_image(*image_id).await.unwrap();
        assert!(files.get(&image.path).await.is_some());
    }
}

#[tokio::test]
async fn test_failed_delete_is_degraded_success() {
    let (service, files) = setup(1);
    let product = service
        .create_product(request(), uploads(2))
        .await
        .unwrap()
        .into_value();
    let doomed = product.images[0];
    let path = service.get_image(doomed).await.unwrap().path;

    files.fail_deletes(true).await;
    let outcome = service.delete_image(product.id, doomed).await.unwrap();
    assert!(outcome.is_degraded());
    assert_eq!(outcome.side_effects()[0].path(), path);

    // Record is gone, file is orphaned until retried
    assert!(matches!(
        service.get_image(doomed).await,
        Err(CatalogError::NotFound(_))
    ));
    assert_eq!(outcome.value().images, vec![product.images[1]]);
    assert!(files.get(&path).await.is_some());

    let strict = outcome.into_strict();
    match strict {
        Err(CatalogError::SideEffect(failure)) => {
            files.clear_faults().await;
            assert!(service.retry_side_effects(vec![failure]).await.is_empty());
            assert!(files.get(&path).await.is_none());
        }
        other => panic!("expected side effect error, got {:?}", other.map(|p| p.id)),
    }
}

#[tokio::test]
async fn test_pre_commit_failure_skips_file_store() {
    let (service, files) = setup(1);

    let mut bad = request();
    bad.description = String::new();
    let result = service.create_product(bad, uploads(1)).await;

    assert!(matches!(result, Err(CatalogError::Validation(_))));
    assert!(result.unwrap_err().is_client_error());
    assert!(files.is_empty().await);
}
