// ============================================================================
// Product Catalog Library
// ============================================================================

pub mod catalog;
pub mod config;
pub mod core;
pub mod files;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use catalog::{
    Committed, ImageUpload, NewProduct, PaginatedProducts, Product, ProductField, ProductImage,
    ProductListQuery, ProductService, RelationDelta, SimilarProductsUpdate,
};
pub use config::CatalogConfig;
pub use crate::core::{CatalogError, Category, ImageId, ProductId, Result, SideEffectError};
pub use files::{FileOperation, FileStore, FileStoreError, InMemoryFileStore, LocalFileStore};
pub use storage::DocumentStore;
pub use transaction::{Session, TransactionStats};
