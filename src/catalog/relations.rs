use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::Product;
use crate::core::{CatalogError, ProductId, Result};
use crate::transaction::Session;

/// What a relation sync changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationDelta {
    pub added: Vec<ProductId>,
    pub removed: Vec<ProductId>,
    /// Removed ids whose endpoint no longer existed
    pub dangling: Vec<ProductId>,
}

impl RelationDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A product after its similar-products list was replaced.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarProductsUpdate {
    pub product: Product,
    pub delta: RelationDelta,
}

/// Applies the symmetric similar-products delta for one product.
///
/// Both endpoints of every edge are written through the caller's session, and
/// the caller saves `product` itself. Commit and abort belong to the caller.
#[derive(Debug, Clone)]
pub struct RelationSynchronizer {
    max_similar: usize,
}

impl RelationSynchronizer {
    pub fn new(max_similar: usize) -> Self {
        Self { max_similar }
    }

    pub async fn sync(
        &self,
        session: &mut Session,
        product: &mut Product,
        desired: &[ProductId],
    ) -> Result<RelationDelta> {
        let desired_set = unique_ids(desired)?;
        if desired_set.len() > self.max_similar {
            return Err(CatalogError::validation(format!(
                "at most {} similar products are allowed, got {}",
                self.max_similar,
                desired_set.len()
            )));
        }

        let current_set: HashSet<ProductId> = product.similar_products.iter().copied().collect();
        let to_remove: Vec<ProductId> = product
            .similar_products
            .iter()
            .copied()
            .filter(|id| !desired_set.contains(id))
            .collect();
        let to_add: Vec<ProductId> = desired
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id))
            .collect();

        if to_add.contains(&product.id) {
            return Err(CatalogError::validation(format!(
                "product {} cannot be similar to itself",
                product.id
            )));
        }

        let mut delta = RelationDelta::default();

        for other_id in to_remove {
            match session.find::<Product>(other_id).await? {
                Some(mut other) => {
                    other.unlink(product.id);
                    other.touch();
                    session.save(other)?;
                }
                None => {
                    warn!(
                        product = %product.id,
                        missing = %other_id,
                        "dropping similar-product edge to a product that no longer exists"
                    );
                    delta.dangling.push(other_id);
                }
            }
            product.unlink(other_id);
            delta.removed.push(other_id);
        }

        for other_id in to_add {
            let mut other = session.find::<Product>(other_id).await?.ok_or_else(|| {
                CatalogError::not_found(format!("similar product {} not found", other_id))
            })?;

            if !other.is_similar_to(product.id) && other.similar_products.len() >= self.max_similar {
                return Err(CatalogError::validation(format!(
                    "product {} already has the maximum of {} similar products",
                    other_id, self.max_similar
                )));
            }

            other.link(product.id);
            other.touch();
            session.save(other)?;
            product.link(other_id);
            delta.added.push(other_id);
        }

        if !delta.is_empty() {
            product.touch();
        }

        debug!(
            product = %product.id,
            added = delta.added.len(),
            removed = delta.removed.len(),
            dangling = delta.dangling.len(),
            "similar products synchronized"
        );

        Ok(delta)
    }
}

fn unique_ids(ids: &[ProductId]) -> Result<HashSet<ProductId>> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(CatalogError::validation(format!(
                "product {} is listed more than once",
                id
            )));
        }
    }
    Ok(seen)
}
