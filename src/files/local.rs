use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{FileStore, FileStoreError, StoredFile, check_relative_path};

/// File store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FileStoreError> {
        check_relative_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn upload(&self, file: &StoredFile) -> Result<(), FileStoreError> {
        let target = self.resolve(&file.path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Readers never observe a half-written file.
        let tmp = target.with_extension("part");
        fs::write(&tmp, &file.bytes[..]).await?;
        fs::rename(&tmp, &target).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), FileStoreError> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, FileStoreError> {
        let target = self.resolve(path)?;
        Ok(fs::try_exists(&target).await?)
    }
}
