//! Catalog domain: products, image records, similar-product relations and
//! the service that keeps them consistent.

pub mod image;
pub mod listing;
pub mod outcome;
pub mod product;
pub mod relations;
pub mod service;

pub use image::{ImageRecordManager, ImageUpload, ProductImage, SUPPORTED_IMAGE_TYPES};
pub use listing::{PaginatedProducts, ProductListQuery};
pub use outcome::Committed;
pub use product::{NewProduct, Product, ProductField};
pub use relations::{RelationDelta, RelationSynchronizer, SimilarProductsUpdate};
pub use service::ProductService;
