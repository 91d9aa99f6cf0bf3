pub mod error;
pub mod types;

pub use error::{CatalogError, Result, SideEffectError};
pub use types::{Category, ImageId, ProductId};
