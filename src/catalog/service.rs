use std::collections::HashSet;
use std::sync::Arc;

use futures::{StreamExt, future, stream};
use tracing::{Span, debug, error, info, instrument, warn};

use super::{
    Committed, ImageRecordManager, ImageUpload, NewProduct, PaginatedProducts, Product,
    ProductField, ProductImage, ProductListQuery, RelationSynchronizer, SimilarProductsUpdate,
};
use crate::config::CatalogConfig;
use crate::core::{CatalogError, Category, ImageId, ProductId, Result, SideEffectError};
use crate::files::{FileOperation, FileStore, InMemoryFileStore, LocalFileStore};
use crate::storage::DocumentStore;
use crate::transaction::Session;

/// Keeps products, their image records, their similar-product edges and the
/// image files consistent.
///
/// Every multi-document operation runs in one session: validate, stage
/// writes, commit, and only then touch the file store. Anything that fails
/// before the commit leaves the store unchanged; file store failures after
/// it are reported through [`Committed`] instead of undoing the commit.
#[derive(Clone)]
pub struct ProductService {
    store: Arc<DocumentStore>,
    files: Arc<dyn FileStore>,
    images: ImageRecordManager,
    relations: RelationSynchronizer,
    config: CatalogConfig,
}

impl ProductService {
    /// Build a service from configuration: snapshot store and local files
    /// under `data_dir` when set, everything in memory otherwise.
    pub async fn open(config: CatalogConfig) -> Result<Self> {
        let (store, files): (DocumentStore, Arc<dyn FileStore>) =
            match (config.snapshot_path(), config.files_root()) {
                (Some(snapshot), Some(root)) => (
                    DocumentStore::open(snapshot).await?,
                    Arc::new(LocalFileStore::new(root)),
                ),
                _ => (DocumentStore::new(), Arc::new(InMemoryFileStore::new())),
            };
        Self::new(Arc::new(store), files, config)
    }

    /// Rejects configurations that fail [`CatalogConfig::validate`].
    pub fn new(
        store: Arc<DocumentStore>,
        files: Arc<dyn FileStore>,
        config: CatalogConfig,
    ) -> Result<Self> {
        config.validate().map_err(|err| {
            CatalogError::validation(format!("invalid catalog configuration: {:#}", err))
        })?;

        Ok(Self {
            images: ImageRecordManager::new(config.image_path_prefix.clone()),
            relations: RelationSynchronizer::new(config.max_similar_products),
            store,
            files,
            config,
        })
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Transactional operations
    // ------------------------------------------------------------------

    #[instrument(skip_all, fields(product = tracing::field::Empty, images = uploads.len()))]
    pub async fn create_product(
        &self,
        request: NewProduct,
        uploads: Vec<ImageUpload>,
    ) -> Result<Committed<Product>> {
        request.validate(&self.config)?;
        self.check_image_count(uploads.len())?;
        for upload in &uploads {
            upload.validate()?;
        }

        let product_id = ProductId::new();
        Span::current().record("product", tracing::field::display(product_id));

        let mut session = self.store.begin()?;
        let staged = self
            .stage_new_product(&mut session, product_id, request, &uploads)
            .await;
        let (product, images) = self.finish(session, staged).await?;
        info!(
            similar = product.similar_products.len(),
            "product created"
        );

        let operations = images
            .into_iter()
            .zip(uploads)
            .map(|(image, upload)| FileOperation::Upload(upload.into_stored_file(image.path)))
            .collect();
        let failures = self.run_file_operations(operations).await;
        Ok(Committed::with_failures(product, failures))
    }

    #[instrument(skip(self, upload), fields(file = %upload.file_name))]
    pub async fn add_image(
        &self,
        product_id: ProductId,
        upload: ImageUpload,
    ) -> Result<Committed<Product>> {
        upload.validate()?;

        let mut session = self.store.begin()?;
        let staged = self.stage_add_image(&mut session, product_id, &upload).await;
        let (product, image) = self.finish(session, staged).await?;
        info!(image = %image.id, count = product.images.len(), "image added");

        let failures = self
            .run_file_operations(vec![FileOperation::Upload(
                upload.into_stored_file(image.path),
            )])
            .await;
        Ok(Committed::with_failures(product, failures))
    }

    #[instrument(skip(self))]
    pub async fn delete_image(
        &self,
        product_id: ProductId,
        image_id: ImageId,
    ) -> Result<Committed<Product>> {
        let mut session = self.store.begin()?;
        let staged = self
            .stage_delete_image(&mut session, product_id, image_id)
            .await;
        let (product, path) = self.finish(session, staged).await?;
        info!(count = product.images.len(), "image deleted");

        let failures = self
            .run_file_operations(vec![FileOperation::Delete { path }])
            .await;
        Ok(Committed::with_failures(product, failures))
    }

    #[instrument(skip(self, desired), fields(desired = desired.len()))]
    pub async fn edit_similar_products(
        &self,
        product_id: ProductId,
        desired: Vec<ProductId>,
    ) -> Result<SimilarProductsUpdate> {
        let mut session = self.store.begin()?;
        let staged = self
            .stage_similar_products(&mut session, product_id, &desired)
            .await;
        let update = self.finish(session, staged).await?;
        info!(
            added = update.delta.added.len(),
            removed = update.delta.removed.len(),
            "similar products updated"
        );
        Ok(update)
    }

    // ------------------------------------------------------------------
    // Single-product operations
    // ------------------------------------------------------------------

    #[instrument(skip(self, order), fields(count = order.len()))]
    pub async fn rearrange_images(
        &self,
        product_id: ProductId,
        order: Vec<ImageId>,
    ) -> Result<Product> {
        let mut session = self.store.begin()?;
        let staged = self.stage_rearrange(&mut session, product_id, order).await;
        let product = self.finish(session, staged).await?;
        debug!("images rearranged");
        Ok(product)
    }

    #[instrument(skip(self, field), fields(field = field.name()))]
    pub async fn edit_field(&self, product_id: ProductId, field: ProductField) -> Result<Product> {
        field.validate(&self.config)?;

        let mut session = self.store.begin()?;
        let staged = self.stage_field_edit(&mut session, product_id, field).await;
        let product = self.finish(session, staged).await?;
        debug!("product field updated");
        Ok(product)
    }

    pub async fn edit_name(&self, product_id: ProductId, name: impl Into<String>) -> Result<Product> {
        self.edit_field(product_id, ProductField::Name(name.into()))
            .await
    }

    pub async fn edit_description(
        &self,
        product_id: ProductId,
        description: impl Into<String>,
    ) -> Result<Product> {
        self.edit_field(product_id, ProductField::Description(description.into()))
            .await
    }

    pub async fn edit_quantity(&self, product_id: ProductId, quantity: u32) -> Result<Product> {
        self.edit_field(product_id, ProductField::Quantity(quantity))
            .await
    }

    pub async fn edit_category(&self, product_id: ProductId, category: Category) -> Result<Product> {
        self.edit_field(product_id, ProductField::Category(category))
            .await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product> {
        self.store
            .find_by_id::<Product>(product_id)
            .await?
            .ok_or_else(|| product_not_found(product_id))
    }

    /// All-or-nothing batch lookup in input order.
    pub async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            match self.store.find_by_id::<Product>(*id).await? {
                Some(product) => found.push(product),
                None => missing.push(id.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(CatalogError::not_found(format!(
                "products not found: {}",
                missing.join(", ")
            )));
        }
        Ok(found)
    }

    pub async fn list_products(&self, query: ProductListQuery) -> Result<PaginatedProducts> {
        query.validate(&self.config)?;

        let filter = query.to_filter();
        let per_page = query.per_page(&self.config);
        let total = self.store.count_documents(&filter).await;
        let items = self
            .store
            .find(&filter, query.offset(&self.config), per_page as usize)
            .await;

        Ok(PaginatedProducts::new(items, query.page(), per_page, total))
    }

    pub async fn get_image(&self, image_id: ImageId) -> Result<ProductImage> {
        self.store
            .find_by_id::<ProductImage>(image_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(format!("image {} not found", image_id)))
    }

    // ------------------------------------------------------------------
    // Repair
    // ------------------------------------------------------------------

    /// Replay file store calls from degraded outcomes. Returns the ones that
    /// failed again.
    pub async fn retry_side_effects(&self, failures: Vec<SideEffectError>) -> Vec<SideEffectError> {
        let operations = failures.into_iter().map(|f| f.operation).collect();
        self.run_file_operations(operations).await
    }

    // ------------------------------------------------------------------
    // Staging
    // ------------------------------------------------------------------

    async fn stage_new_product(
        &self,
        session: &mut Session,
        product_id: ProductId,
        request: NewProduct,
        uploads: &[ImageUpload],
    ) -> Result<(Product, Vec<ProductImage>)> {
        let mut images = Vec::with_capacity(uploads.len());
        for upload in uploads {
            images.push(self.images.create_image(upload, product_id, session)?);
        }

        let similar = request.similar_products.clone();
        let mut product = request.into_product(product_id, images.iter().map(|i| i.id).collect());
        self.relations.sync(session, &mut product, &similar).await?;

        session.save(product.clone())?;
        Ok((product, images))
    }

    async fn stage_add_image(
        &self,
        session: &mut Session,
        product_id: ProductId,
        upload: &ImageUpload,
    ) -> Result<(Product, ProductImage)> {
        let mut product = load_product(session, product_id).await?;
        if product.images.len() >= self.config.max_images {
            return Err(CatalogError::validation(format!(
                "product {} already has the maximum of {} images",
                product_id, self.config.max_images
            )));
        }

        let image = self.images.create_image(upload, product_id, session)?;
        product.images.push(image.id);
        product.touch();
        session.save(product.clone())?;
        Ok((product, image))
    }

    async fn stage_delete_image(
        &self,
        session: &mut Session,
        product_id: ProductId,
        image_id: ImageId,
    ) -> Result<(Product, String)> {
        let mut product = load_product(session, product_id).await?;
        if session.find::<ProductImage>(image_id).await?.is_none() {
            return Err(CatalogError::not_found(format!("image {} not found", image_id)));
        }
        if !product.has_image(image_id) {
            return Err(CatalogError::conflict(format!(
                "image {} does not belong to product {}",
                image_id, product_id
            )));
        }
        if product.images.len() <= 1 {
            return Err(CatalogError::validation(format!(
                "product {} must keep at least one image",
                product_id
            )));
        }

        product.images.retain(|id| *id != image_id);
        product.touch();
        session.save(product.clone())?;
        let path = self.images.delete_image(image_id, session).await?;
        Ok((product, path))
    }

    async fn stage_rearrange(
        &self,
        session: &mut Session,
        product_id: ProductId,
        order: Vec<ImageId>,
    ) -> Result<Product> {
        let mut product = load_product(session, product_id).await?;
        check_permutation(&product.images, &order)?;

        product.images = order;
        product.touch();
        session.save(product.clone())?;
        Ok(product)
    }

    async fn stage_field_edit(
        &self,
        session: &mut Session,
        product_id: ProductId,
        field: ProductField,
    ) -> Result<Product> {
        let mut product = load_product(session, product_id).await?;
        field.apply(&mut product);
        session.save(product.clone())?;
        Ok(product)
    }

    async fn stage_similar_products(
        &self,
        session: &mut Session,
        product_id: ProductId,
        desired: &[ProductId],
    ) -> Result<SimilarProductsUpdate> {
        let mut product = load_product(session, product_id).await?;
        let delta = self.relations.sync(session, &mut product, desired).await?;
        session.save(product.clone())?;
        Ok(SimilarProductsUpdate { product, delta })
    }

    // ------------------------------------------------------------------
    // Session and side effect plumbing
    // ------------------------------------------------------------------

    /// Commit a successfully staged session, or abort it. The session is
    /// always ended before returning.
    async fn finish<T>(&self, mut session: Session, staged: Result<T>) -> Result<T> {
        match staged {
            Ok(value) => {
                let committed = session.commit().await;
                if let Err(err) = &committed {
                    error!(txn = %session.id(), error = %err, "commit failed");
                }
                session.end();
                committed.map(|()| value)
            }
            Err(err) => {
                debug!(txn = %session.id(), error = %err, "aborting session");
                session.abort();
                session.end();
                Err(err)
            }
        }
    }

    /// Run file operations after a commit. Results keep input order even when
    /// several run at once.
    async fn run_file_operations(&self, operations: Vec<FileOperation>) -> Vec<SideEffectError> {
        let files = self.files.as_ref();
        let concurrency = self.config.upload_concurrency.max(1);

        let failures: Vec<SideEffectError> = stream::iter(operations)
            .map(|operation| async move {
                match operation.run(files).await {
                    Ok(()) => None,
                    Err(err) => {
                        warn!(
                            action = operation.action(),
                            path = operation.path(),
                            error = %err,
                            "post-commit file operation failed"
                        );
                        Some(SideEffectError::new(operation, err.to_string()))
                    }
                }
            })
            .buffered(concurrency)
            .filter_map(future::ready)
            .collect()
            .await;

        if !failures.is_empty() {
            warn!(failed = failures.len(), "operation committed with missing file side effects");
        }
        failures
    }

    fn check_image_count(&self, count: usize) -> Result<()> {
        if count == 0 || count > self.config.max_images {
            return Err(CatalogError::validation(format!(
                "a product needs between 1 and {} images, got {}",
                self.config.max_images, count
            )));
        }
        Ok(())
    }
}

async fn load_product(session: &mut Session, product_id: ProductId) -> Result<Product> {
    session
        .find::<Product>(product_id)
        .await?
        .ok_or_else(|| product_not_found(product_id))
}

fn product_not_found(product_id: ProductId) -> CatalogError {
    CatalogError::not_found(format!("product {} not found", product_id))
}

/// `order` must hold exactly the ids of `current`, each once, in any order.
fn check_permutation(current: &[ImageId], order: &[ImageId]) -> Result<()> {
    if order.len() != current.len() {
        return Err(CatalogError::validation(format!(
            "expected {} image ids, got {}",
            current.len(),
            order.len()
        )));
    }

    let known: HashSet<&ImageId> = current.iter().collect();
    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !known.contains(id) {
            return Err(CatalogError::validation(format!(
                "image {} does not belong to this product",
                id
            )));
        }
        if !seen.insert(id) {
            return Err(CatalogError::validation(format!(
                "image {} is listed more than once",
                id
            )));
        }
    }
    Ok(())
}
