use super::persistence::{SnapshotFile, StoreSnapshot};
use super::{Collection, Document, DocumentKey, ProductFilter, StoredDocument, Versioned};
use crate::catalog::Product;
use crate::core::{CatalogError, Result};
use crate::transaction::{
    Change, ReadSet, Session, TransactionId, TransactionManager, TransactionState,
    TransactionStats,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Committed documents plus the last version handed out.
#[derive(Debug, Clone, Default)]
struct StoreState {
    documents: HashMap<DocumentKey, Versioned>,
    version: u64,
}

impl StoreState {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let documents = snapshot
            .documents
            .into_iter()
            .map(|versioned| (versioned.document.key(), versioned))
            .collect();
        Self {
            documents,
            version: snapshot.store_version,
        }
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        let mut documents: Vec<Versioned> = self.documents.values().cloned().collect();
        documents.sort_by_key(|v| v.version);
        StoreSnapshot::new(self.version, documents)
    }

    /// Every key read or written must still carry the version first observed.
    fn validate(&self, txn_id: TransactionId, reads: &ReadSet) -> Result<()> {
        for (key, observed) in reads {
            let current = self.documents.get(key).map(|v| v.version);
            if current != *observed {
                return Err(CatalogError::transaction(format!(
                    "Write-write conflict on {} in {} (read version {:?}, now {:?})",
                    key, txn_id, observed, current
                )));
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: &[Change]) {
        self.version += 1;
        let version = self.version;
        for change in changes {
            match change {
                Change::Put(document) => {
                    self.documents.insert(
                        document.key(),
                        Versioned {
                            version,
                            document: document.clone(),
                        },
                    );
                }
                Change::Delete(key) => {
                    self.documents.remove(key);
                }
            }
        }
    }

    fn products(&self) -> impl Iterator<Item = &Product> {
        self.documents.values().filter_map(|v| match &v.document {
            StoredDocument::Product(product) => Some(product),
            _ => None,
        })
    }
}

/// Transactional in-memory document store.
///
/// Sessions from [`DocumentStore::begin`] buffer writes and publish them in
/// one step. When opened with a snapshot path, every publish is written to
/// disk before it becomes visible.
pub struct DocumentStore {
    state: RwLock<StoreState>,
    transactions: TransactionManager,
    snapshot: Option<SnapshotFile>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            transactions: TransactionManager::new(),
            snapshot: None,
        }
    }

    /// Open a store backed by a snapshot file, loading it if it exists.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let snapshot = SnapshotFile::new(path);
        let state = match snapshot.load().await? {
            Some(loaded) => {
                info!(
                    path = %snapshot.path().display(),
                    products = loaded.metadata.product_count,
                    images = loaded.metadata.image_count,
                    "document store recovered from snapshot"
                );
                StoreState::from_snapshot(loaded)
            }
            None => StoreState::default(),
        };

        Ok(Self {
            state: RwLock::new(state),
            transactions: TransactionManager::new(),
            snapshot: Some(snapshot),
        })
    }

    /// Start a unit of work.
    pub fn begin(self: &Arc<Self>) -> Result<Session> {
        let txn_id = self.transactions.begin()?;
        debug!(txn = %txn_id, "session started");
        Ok(Session::new(Arc::clone(self), txn_id))
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    pub fn transaction_stats(&self) -> TransactionStats {
        self.transactions.stats()
    }

    pub async fn find_by_id<D: Document>(&self, id: D::Id) -> Result<Option<D>> {
        Ok(self
            .read_versioned(&D::key_for(id))
            .await
            .and_then(|v| D::from_stored(v.document)))
    }

    /// Auto-committed single-document insert or replace.
    pub async fn save<D: Document>(&self, document: D) -> Result<()> {
        self.apply_single(Change::Put(document.into_stored())).await
    }

    /// Auto-committed single-document delete.
    pub async fn delete_one<D: Document>(&self, document: &D) -> Result<()> {
        self.apply_single(Change::Delete(D::key_for(document.id())))
            .await
    }

    pub async fn count_documents(&self, filter: &ProductFilter) -> usize {
        let state = self.state.read().await;
        state.products().filter(|p| filter.matches(p)).count()
    }

    /// Matching products ordered by creation time, then id.
    pub async fn find(&self, filter: &ProductFilter, skip: usize, limit: usize) -> Vec<Product> {
        let state = self.state.read().await;
        let mut matched: Vec<&Product> = state.products().filter(|p| filter.matches(p)).collect();
        matched.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        matched.into_iter().skip(skip).take(limit).cloned().collect()
    }

    pub async fn collection_len(&self, collection: Collection) -> usize {
        let state = self.state.read().await;
        state
            .documents
            .keys()
            .filter(|key| key.collection() == collection)
            .count()
    }

    pub async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    pub(crate) async fn read_versioned(&self, key: &DocumentKey) -> Option<Versioned> {
        self.state.read().await.documents.get(key).cloned()
    }

    /// Validate and publish a transaction's changes under the write lock.
    pub(crate) async fn apply_transaction(
        &self,
        txn_id: TransactionId,
        reads: &ReadSet,
        changes: &[Change],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.validate(txn_id, reads)?;

        if changes.is_empty() {
            return Ok(());
        }

        match &self.snapshot {
            Some(snapshot) => {
                let mut next = state.clone();
                next.apply(changes);
                snapshot.save(&next.to_snapshot()).await.map_err(|err| {
                    warn!(txn = %txn_id, error = %err, "snapshot write failed; commit rejected");
                    CatalogError::transaction(format!("{} not persisted: {}", txn_id, err))
                })?;
                *state = next;
            }
            None => state.apply(changes),
        }

        Ok(())
    }

    async fn apply_single(&self, change: Change) -> Result<()> {
        let txn_id = self.transactions.begin()?;
        let result = self
            .apply_transaction(txn_id, &ReadSet::new(), std::slice::from_ref(&change))
            .await;
        let state = if result.is_ok() {
            TransactionState::Committed
        } else {
            TransactionState::Aborted
        };
        self.transactions.finish(txn_id, state)?;
        result
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}
