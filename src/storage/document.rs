use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::catalog::{Product, ProductImage};
use crate::core::{ImageId, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Products,
    Images,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Products => f.write_str("products"),
            Collection::Images => f.write_str("images"),
        }
    }
}

/// Identity of a stored document across all collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKey {
    Product(ProductId),
    Image(ImageId),
}

impl DocumentKey {
    pub fn collection(&self) -> Collection {
        match self {
            DocumentKey::Product(_) => Collection::Products,
            DocumentKey::Image(_) => Collection::Images,
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKey::Product(id) => write!(f, "products/{}", id),
            DocumentKey::Image(id) => write!(f, "images/{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredDocument {
    Product(Product),
    Image(ProductImage),
}

impl StoredDocument {
    pub fn key(&self) -> DocumentKey {
        match self {
            StoredDocument::Product(product) => DocumentKey::Product(product.id),
            StoredDocument::Image(image) => DocumentKey::Image(image.id),
        }
    }
}

/// A committed document together with the store version that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned {
    pub version: u64,
    pub document: StoredDocument,
}

/// A type that lives in one collection of the document store.
pub trait Document: Clone + Send + Sync + Sized + 'static {
    type Id: Copy + Eq + Hash + fmt::Display + Send + Sync;

    const COLLECTION: Collection;

    fn id(&self) -> Self::Id;

    fn key_for(id: Self::Id) -> DocumentKey;

    fn into_stored(self) -> StoredDocument;

    fn from_stored(document: StoredDocument) -> Option<Self>;
}

impl Document for Product {
    type Id = ProductId;

    const COLLECTION: Collection = Collection::Products;

    fn id(&self) -> ProductId {
        self.id
    }

    fn key_for(id: ProductId) -> DocumentKey {
        DocumentKey::Product(id)
    }

    fn into_stored(self) -> StoredDocument {
        StoredDocument::Product(self)
    }

    fn from_stored(document: StoredDocument) -> Option<Self> {
        match document {
            StoredDocument::Product(product) => Some(product),
            _ => None,
        }
    }
}

impl Document for ProductImage {
    type Id = ImageId;

    const COLLECTION: Collection = Collection::Images;

    fn id(&self) -> ImageId {
        self.id
    }

    fn key_for(id: ImageId) -> DocumentKey {
        DocumentKey::Image(id)
    }

    fn into_stored(self) -> StoredDocument {
        StoredDocument::Image(self)
    }

    fn from_stored(document: StoredDocument) -> Option<Self> {
        match document {
            StoredDocument::Image(image) => Some(image),
            _ => None,
        }
    }
}
