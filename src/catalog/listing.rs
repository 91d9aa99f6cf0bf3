use serde::{Deserialize, Serialize};

use super::Product;
use crate::config::CatalogConfig;
use crate::core::{CatalogError, Category, Result};
use crate::storage::ProductFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductListQuery {
    /// 1-based; defaults to 1
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Category>,
    pub popular: Option<bool>,
    pub name_contains: Option<String>,
    pub min_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub in_stock: Option<bool>,
}

impl ProductListQuery {
    pub fn validate(&self, config: &CatalogConfig) -> Result<()> {
        if self.page == Some(0) {
            return Err(CatalogError::validation("page must be at least 1"));
        }
        if let Some(per_page) = self.per_page {
            if per_page == 0 || per_page > config.max_page_size {
                return Err(CatalogError::validation(format!(
                    "per_page must be between 1 and {}",
                    config.max_page_size
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price_cents, self.max_price_cents) {
            if min > max {
                return Err(CatalogError::validation(
                    "min_price_cents must not exceed max_price_cents",
                ));
            }
        }
        Ok(())
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn per_page(&self, config: &CatalogConfig) -> u32 {
        self.per_page.unwrap_or(config.default_page_size)
    }

    pub fn offset(&self, config: &CatalogConfig) -> usize {
        let page = usize::try_from(self.page().saturating_sub(1)).unwrap_or(usize::MAX);
        let per_page = usize::try_from(self.per_page(config)).unwrap_or(usize::MAX);
        page.saturating_mul(per_page)
    }

    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            category: self.category,
            popular: self.popular,
            name_contains: self.name_contains.clone().filter(|s| !s.trim().is_empty()),
            min_price_cents: self.min_price_cents,
            max_price_cents: self.max_price_cents,
            in_stock: self.in_stock,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedProducts {
    pub items: Vec<Product>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PaginatedProducts {
    pub(crate) fn new(items: Vec<Product>, page: u32, per_page: u32, total: usize) -> Self {
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        let total_pages = if total == 0 {
            0
        } else {
            u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX)
        };

        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }
}
