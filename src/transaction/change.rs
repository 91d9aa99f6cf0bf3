// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change is a buffered document write. Changes are applied in order on
// COMMIT and discarded on ABORT.
//
// ============================================================================

use crate::storage::{Collection, DocumentKey, StoredDocument};

/// A single buffered write in a transaction
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert or replace a document
    Put(StoredDocument),

    /// Remove a document
    Delete(DocumentKey),
}

impl Change {
    /// Key of the document affected by this change
    pub fn key(&self) -> DocumentKey {
        match self {
            Change::Put(document) => document.key(),
            Change::Delete(key) => *key,
        }
    }

    /// Collection affected by this change
    pub fn collection(&self) -> Collection {
        self.key().collection()
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Change::Delete(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ImageId, ProductId};

    #[test]
    fn test_change_key_and_collection() {
        let image = ImageId::new();
        let change = Change::Delete(DocumentKey::Image(image));
        assert_eq!(change.key(), DocumentKey::Image(image));
        assert_eq!(change.collection(), Collection::Images);
        assert!(change.is_delete());

        let product = DocumentKey::Product(ProductId::new());
        assert_eq!(Change::Delete(product).collection(), Collection::Products);
    }
}
