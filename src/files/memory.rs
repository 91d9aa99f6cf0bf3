use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{FileStore, FileStoreError, StoredFile, check_relative_path};

#[derive(Default)]
struct Faults {
    fail_uploads: bool,
    fail_deletes: bool,
    failing_paths: HashSet<String>,
}

/// In-memory file store with switchable failures for exercising
/// post-commit error handling.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<String, Arc<[u8]>>>,
    faults: RwLock<Faults>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_uploads(&self, fail: bool) {
        self.faults.write().await.fail_uploads = fail;
    }

    pub async fn fail_deletes(&self, fail: bool) {
        self.faults.write().await.fail_deletes = fail;
    }

    /// Make every call touching `path` fail until cleared.
    pub async fn fail_path(&self, path: impl Into<String>) {
        self.faults.write().await.failing_paths.insert(path.into());
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    pub async fn get(&self, path: &str) -> Option<Arc<[u8]>> {
        self.files.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    async fn check(&self, path: &str, blanket: impl Fn(&Faults) -> bool) -> Result<(), FileStoreError> {
        check_relative_path(path)?;
        let faults = self.faults.read().await;
        if blanket(&faults) || faults.failing_paths.contains(path) {
            return Err(FileStoreError::Unavailable(format!(
                "injected failure for '{}'",
                path
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn upload(&self, file: &StoredFile) -> Result<(), FileStoreError> {
        self.check(&file.path, |faults| faults.fail_uploads).await?;
        self.files
            .write()
            .await
            .insert(file.path.clone(), Arc::clone(&file.bytes));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), FileStoreError> {
        self.check(path, |faults| faults.fail_deletes).await?;
        self.files.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, FileStoreError> {
        check_relative_path(path)?;
        Ok(self.files.read().await.contains_key(path))
    }
}
