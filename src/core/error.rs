use thiserror::Error;

use crate::files::FileOperation;

/// Failure of a catalog operation.
///
/// `Validation`, `NotFound` and `Conflict` are raised before commit and leave
/// the store untouched. `Transaction` means the commit itself failed and
/// nothing was persisted. `SideEffect` only appears when a caller asks for a
/// strict view of a degraded success (see [`crate::catalog::Committed`]).
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("side effect failed: {0}")]
    SideEffect(SideEffectError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// 400-class failures: the request was wrong for the current store state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// A file store call that failed after its transaction had already committed.
///
/// Carries the operation itself so it can be replayed on its own through
/// [`crate::catalog::ProductService::retry_side_effects`].
#[derive(Error, Debug, Clone)]
#[error("{} of '{}' failed: {reason}", operation.action(), operation.path())]
pub struct SideEffectError {
    pub operation: FileOperation,
    pub reason: String,
}

impl SideEffectError {
    pub fn new(operation: FileOperation, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }

    pub fn path(&self) -> &str {
        self.operation.path()
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
