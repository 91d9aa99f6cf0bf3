//! Snapshot persistence for the document store

use crate::core::{CatalogError, Result};
use crate::storage::{Collection, Versioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Store Snapshot
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub format_version: u32,
    /// Highest version assigned by the store when the snapshot was taken
    pub store_version: u64,
    pub documents: Vec<Versioned>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub product_count: usize,
    pub image_count: usize,
}

impl StoreSnapshot {
    pub fn new(store_version: u64, documents: Vec<Versioned>) -> Self {
        let count = |collection: Collection| {
            documents
                .iter()
                .filter(|v| v.document.key().collection() == collection)
                .count()
        };
        let metadata = SnapshotMetadata {
            created_at: Utc::now(),
            product_count: count(Collection::Products),
            image_count: count(Collection::Images),
        };

        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            store_version,
            documents,
            metadata,
        }
    }
}

// ============================================================================
// Snapshot File
// ============================================================================

/// MessagePack snapshot on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn load(&self) -> Result<Option<StoreSnapshot>> {
        if !self.exists().await {
            return Ok(None);
        }

        let bytes = fs::read(&self.path).await.map_err(|err| {
            CatalogError::storage(format!(
                "Failed to read snapshot '{}': {}",
                self.path.display(),
                err
            ))
        })?;

        let snapshot: StoreSnapshot = rmp_serde::from_slice(&bytes).map_err(|err| {
            CatalogError::storage(format!(
                "Failed to decode snapshot '{}': {}",
                self.path.display(),
                err
            ))
        })?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(CatalogError::storage(format!(
                "Unsupported snapshot format {} in '{}'",
                snapshot.format_version,
                self.path.display()
            )));
        }

        Ok(Some(snapshot))
    }

    /// Writes the snapshot to a temporary file and atomically renames it to the target path.
    pub async fn save(&self, snapshot: &StoreSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                CatalogError::storage(format!(
                    "Failed to create snapshot directory '{}': {}",
                    parent.display(),
                    err
                ))
            })?;
        }

        let bytes = rmp_serde::to_vec_named(snapshot)
            .map_err(|err| CatalogError::storage(format!("Failed to encode snapshot: {}", err)))?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, bytes).await.map_err(|err| {
            CatalogError::storage(format!(
                "Failed to write temp file '{}': {}",
                tmp_path.display(),
                err
            ))
        })?;

        fs::rename(&tmp_path, &self.path).await.map_err(|err| {
            CatalogError::storage(format!(
                "Failed to rename temp file '{}' -> '{}': {}",
                tmp_path.display(),
                self.path.display(),
                err
            ))
        })?;

        Ok(())
    }
}
