//! File store gateway: durable storage for image bytes, outside any transaction.

pub mod local;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use local::LocalFileStore;
pub use memory::InMemoryFileStore;

#[derive(Error, Debug)]
pub enum FileStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("file store unavailable: {0}")]
    Unavailable(String),
}

/// Bytes bound for the file store under a generated path.
#[derive(Clone)]
pub struct StoredFile {
    pub path: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

impl StoredFile {
    pub fn new(path: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredFile")
            .field("path", &self.path)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A file store mutation scheduled after a commit.
#[derive(Debug, Clone)]
pub enum FileOperation {
    Upload(StoredFile),
    Delete { path: String },
}

impl FileOperation {
    pub fn action(&self) -> &'static str {
        match self {
            FileOperation::Upload(_) => "upload",
            FileOperation::Delete { .. } => "delete",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileOperation::Upload(file) => &file.path,
            FileOperation::Delete { path } => path,
        }
    }

    pub async fn run(&self, store: &dyn FileStore) -> Result<(), FileStoreError> {
        match self {
            FileOperation::Upload(file) => store.upload(file).await,
            FileOperation::Delete { path } => store.delete(path).await,
        }
    }
}

/// Upload and delete are each atomic per call. Deleting a missing path succeeds.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, file: &StoredFile) -> Result<(), FileStoreError>;
    async fn delete(&self, path: &str) -> Result<(), FileStoreError>;
    async fn exists(&self, path: &str) -> Result<bool, FileStoreError>;
}

/// Reject absolute paths and parent traversal before touching a backend.
pub(crate) fn check_relative_path(path: &str) -> Result<(), FileStoreError> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| segment.is_empty() || segment == "..");
    if invalid {
        return Err(FileStoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_checked() {
        assert!(check_relative_path("images/a/b.png").is_ok());
        assert!(check_relative_path("").is_err());
        assert!(check_relative_path("/etc/passwd").is_err());
        assert!(check_relative_path("images/../secret").is_err());
        assert!(check_relative_path("images//b.png").is_err());
    }

    #[test]
    fn operation_reports_action_and_path() {
        let upload = FileOperation::Upload(StoredFile::new("images/p/i.png", "image/png", vec![1]));
        assert_eq!(upload.action(), "upload");
        assert_eq!(upload.path(), "images/p/i.png");

        let delete = FileOperation::Delete {
            path: "images/p/i.png".to_string(),
        };
        assert_eq!(delete.action(), "delete");
    }
}
