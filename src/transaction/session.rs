use std::sync::Arc;

use tracing::{debug, warn};

use super::{Change, Transaction, TransactionId, TransactionState};
use crate::core::{CatalogError, Result};
use crate::storage::{Document, DocumentStore};

/// Handle bound to one logical unit of work against a [`DocumentStore`].
///
/// Writes issued through the handle are invisible to other readers until
/// [`Session::commit`] succeeds. Reads see this session's own pending writes
/// first. A session dropped while still active is aborted.
pub struct Session {
    store: Arc<DocumentStore>,
    txn: Transaction,
}

impl Session {
    pub(crate) fn new(store: Arc<DocumentStore>, id: TransactionId) -> Self {
        Self {
            store,
            txn: Transaction::new(id),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.txn.id()
    }

    pub fn state(&self) -> TransactionState {
        self.txn.state()
    }

    pub fn pending_changes(&self) -> usize {
        self.txn.change_count()
    }

    /// Load a document as this session sees it.
    pub async fn find<D: Document>(&mut self, id: D::Id) -> Result<Option<D>> {
        self.ensure_active("read")?;
        let key = D::key_for(id);

        if let Some(change) = self.txn.pending(&key) {
            return Ok(match change {
                Change::Put(document) => D::from_stored(document.clone()),
                Change::Delete(_) => None,
            });
        }

        let committed = self.store.read_versioned(&key).await;
        self.txn.observe(key, committed.as_ref().map(|v| v.version));
        Ok(committed.and_then(|v| D::from_stored(v.document)))
    }

    /// Buffer an insert-or-replace of `document`.
    pub fn save<D: Document>(&mut self, document: D) -> Result<()> {
        self.txn.record_change(Change::Put(document.into_stored()))
    }

    /// Buffer the removal of `document`.
    pub fn delete_one<D: Document>(&mut self, document: &D) -> Result<()> {
        self.txn
            .record_change(Change::Delete(D::key_for(document.id())))
    }

    /// Atomically publish every buffered write, or none of them.
    ///
    /// On failure the session is aborted before the error is returned.
    pub async fn commit(&mut self) -> Result<()> {
        self.ensure_active("commit")?;

        let applied = self
            .store
            .apply_transaction(self.txn.id(), self.txn.reads(), self.txn.changes())
            .await;

        match applied {
            Ok(()) => {
                let changes = self.txn.change_count();
                self.txn.commit()?;
                self.store
                    .transactions()
                    .finish(self.txn.id(), TransactionState::Committed)?;
                debug!(txn = %self.txn.id(), changes, "session committed");
                Ok(())
            }
            Err(err) => {
                self.abort();
                Err(err)
            }
        }
    }

    /// Discard every buffered write. No-op on a session that already finished.
    pub fn abort(&mut self) {
        if !self.txn.state().is_active() {
            return;
        }

        let discarded = self.txn.change_count();
        if let Err(err) = self.txn.rollback() {
            warn!(txn = %self.txn.id(), error = %err, "rollback failed");
        }
        if let Err(err) = self
            .store
            .transactions()
            .finish(self.txn.id(), TransactionState::Aborted)
        {
            warn!(txn = %self.txn.id(), error = %err, "abort not registered");
        }
        debug!(txn = %self.txn.id(), discarded, "session aborted");
    }

    /// Release the session. An active session is aborted first.
    pub fn end(mut self) {
        if self.txn.state().is_active() {
            warn!(txn = %self.txn.id(), "session ended without commit or abort");
            self.abort();
        }
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        if self.txn.state().is_active() {
            return Ok(());
        }
        Err(CatalogError::transaction(format!(
            "Cannot {}: transaction {} is {}",
            operation,
            self.txn.id(),
            self.txn.state()
        )))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.txn.state().is_active() {
            self.abort();
        }
    }
}
