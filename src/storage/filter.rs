use crate::catalog::Product;
use crate::core::Category;

/// Predicate over product documents used by `count_documents` and `find`.
///
/// Every `Some` field narrows the match; the default filter matches all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub popular: Option<bool>,
    /// Case-insensitive substring of the product name
    pub name_contains: Option<String>,
    pub min_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub in_stock: Option<bool>,
}

impl ProductFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn popular(mut self, popular: bool) -> Self {
        self.popular = Some(popular);
        self
    }

    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    pub fn price_between(mut self, min_cents: Option<u64>, max_cents: Option<u64>) -> Self {
        self.min_price_cents = min_cents;
        self.max_price_cents = max_cents;
        self
    }

    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        if self.category.is_some_and(|category| product.category != category) {
            return false;
        }
        if self.popular.is_some_and(|popular| product.popular != popular) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            if !product.name.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if self.min_price_cents.is_some_and(|min| product.price_cents < min) {
            return false;
        }
        if self.max_price_cents.is_some_and(|max| product.price_cents > max) {
            return false;
        }
        if self.in_stock.is_some_and(|in_stock| (product.quantity > 0) != in_stock) {
            return false;
        }
        true
    }
}
