pub mod document;
pub mod filter;
pub mod memory;
pub mod persistence;

pub use document::{Collection, Document, DocumentKey, StoredDocument, Versioned};
pub use filter::ProductFilter;
pub use memory::DocumentStore;
pub use persistence::{SnapshotFile, SnapshotMetadata, StoreSnapshot};
