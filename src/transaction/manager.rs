// ============================================================================
// Transaction Manager
// ============================================================================

use super::{TransactionId, TransactionState};
use crate::core::{CatalogError, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Registry of open transactions.
///
/// Uses a blocking mutex so sessions can deregister themselves from `Drop`.
/// The critical sections never await.
#[derive(Default)]
pub struct TransactionManager {
    active: Mutex<HashMap<TransactionId, Instant>>,
    committed: Mutex<u64>,
    aborted: Mutex<u64>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Result<TransactionId> {
        let transaction_id = TransactionId::new();
        self.active
            .lock()
            .map_err(|err| CatalogError::transaction(err.to_string()))?
            .insert(transaction_id, Instant::now());
        Ok(transaction_id)
    }

    /// Move a transaction out of the active set into a terminal state.
    pub fn finish(&self, txn_id: TransactionId, state: TransactionState) -> Result<()> {
        if !state.is_terminal() {
            return Err(CatalogError::transaction(format!(
                "Transaction {} cannot finish as {}",
                txn_id, state
            )));
        }

        let removed = self
            .active
            .lock()
            .map_err(|err| CatalogError::transaction(err.to_string()))?
            .remove(&txn_id);

        if removed.is_none() {
            return Err(CatalogError::transaction(format!(
                "Transaction {} not found",
                txn_id
            )));
        }

        let counter = match state {
            TransactionState::Committed => &self.committed,
            _ => &self.aborted,
        };
        *counter
            .lock()
            .map_err(|err| CatalogError::transaction(err.to_string()))? += 1;

        Ok(())
    }

    pub fn is_active(&self, txn_id: TransactionId) -> bool {
        self.active
            .lock()
            .map(|active| active.contains_key(&txn_id))
            .unwrap_or(false)
    }

    /// Ids of sessions still open, oldest first.
    pub fn active_sessions(&self) -> Vec<TransactionId> {
        let Ok(active) = self.active.lock() else {
            return Vec::new();
        };
        let mut sessions: Vec<(TransactionId, Instant)> =
            active.iter().map(|(id, started)| (*id, *started)).collect();
        sessions.sort_by_key(|(id, started)| (*started, *id));
        sessions.into_iter().map(|(id, _)| id).collect()
    }

    pub fn stats(&self) -> TransactionStats {
        let active = self.active.lock().map(|a| a.len()).unwrap_or(0);
        let oldest_active = self
            .active
            .lock()
            .ok()
            .and_then(|a| a.values().min().map(|started| started.elapsed()));
        TransactionStats {
            active,
            committed: self.committed.lock().map(|c| *c).unwrap_or(0),
            aborted: self.aborted.lock().map(|a| *a).unwrap_or(0),
            oldest_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub active: usize,
    pub committed: u64,
    pub aborted: u64,
    pub oldest_active: Option<std::time::Duration>,
}
