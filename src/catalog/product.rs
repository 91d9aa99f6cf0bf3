use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CatalogConfig;
use crate::core::{CatalogError, Category, ImageId, ProductId, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price_cents: u64,
    pub quantity: u32,
    pub category: Category,
    pub popular: bool,
    /// Ordered; the first image is the cover
    pub images: Vec<ImageId>,
    /// Every id listed here lists this product back
    pub similar_products: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn has_image(&self, image_id: ImageId) -> bool {
        self.images.contains(&image_id)
    }

    pub fn is_similar_to(&self, other: ProductId) -> bool {
        self.similar_products.contains(&other)
    }

    /// Add one direction of an edge. Returns false if it was already present.
    pub(crate) fn link(&mut self, other: ProductId) -> bool {
        if self.is_similar_to(other) {
            return false;
        }
        self.similar_products.push(other);
        true
    }

    /// Remove one direction of an edge. Returns false if it was absent.
    pub(crate) fn unlink(&mut self, other: ProductId) -> bool {
        let before = self.similar_products.len();
        self.similar_products.retain(|id| *id != other);
        before != self.similar_products.len()
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Input for creating a product. Images are supplied separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: u64,
    pub quantity: u32,
    pub category: Category,
    #[serde(default)]
    pub popular: bool,
    #[serde(default)]
    pub similar_products: Vec<ProductId>,
}

impl NewProduct {
    pub fn validate(&self, config: &CatalogConfig) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        require_price(self.price_cents, config)?;
        Ok(())
    }

    pub(crate) fn into_product(self, id: ProductId, images: Vec<ImageId>) -> Product {
        let now = Utc::now();
        Product {
            id,
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price_cents: self.price_cents,
            quantity: self.quantity,
            category: self.category,
            popular: self.popular,
            images,
            similar_products: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single scalar field edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ProductField {
    Name(String),
    Description(String),
    Quantity(u32),
    Category(Category),
    Price(u64),
    Popular(bool),
}

impl ProductField {
    pub fn name(&self) -> &'static str {
        match self {
            ProductField::Name(_) => "name",
            ProductField::Description(_) => "description",
            ProductField::Quantity(_) => "quantity",
            ProductField::Category(_) => "category",
            ProductField::Price(_) => "price",
            ProductField::Popular(_) => "popular",
        }
    }

    pub fn validate(&self, config: &CatalogConfig) -> Result<()> {
        match self {
            ProductField::Name(value) => require_text("name", value),
            ProductField::Description(value) => require_text("description", value),
            ProductField::Price(cents) => require_price(*cents, config),
            ProductField::Quantity(_) | ProductField::Category(_) | ProductField::Popular(_) => {
                Ok(())
            }
        }
    }

    pub(crate) fn apply(self, product: &mut Product) {
        match self {
            ProductField::Name(value) => product.name = value.trim().to_string(),
            ProductField::Description(value) => product.description = value.trim().to_string(),
            ProductField::Quantity(value) => product.quantity = value,
            ProductField::Category(value) => product.category = value,
            ProductField::Price(value) => product.price_cents = value,
            ProductField::Popular(value) => product.popular = value,
        }
        product.touch();
    }
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_price(cents: u64, config: &CatalogConfig) -> Result<()> {
    if cents < config.min_price_cents {
        return Err(CatalogError::validation(format!(
            "price must be at least {} cents",
            config.min_price_cents
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            name: "  Trail Shoe ".to_string(),
            description: "Light and grippy".to_string(),
            price_cents: 8900,
            quantity: 12,
            category: Category::Sports,
            popular: false,
            similar_products: Vec::new(),
        }
    }

    #[test]
    fn new_product_validation() {
        let config = CatalogConfig::default().min_price_cents(100);
        assert!(new_product().validate(&config).is_ok());

        let mut blank = new_product();
        blank.name = "   ".to_string();
        assert!(matches!(blank.validate(&config), Err(CatalogError::Validation(_))));

        let mut cheap = new_product();
        cheap.price_cents = 99;
        assert!(matches!(cheap.validate(&config), Err(CatalogError::Validation(_))));
    }

    #[test]
    fn into_product_trims_text() {
        let product = new_product().into_product(ProductId::new(), vec![ImageId::new()]);
        assert_eq!(product.name, "Trail Shoe");
        assert_eq!(product.images.len(), 1);
        assert!(product.similar_products.is_empty());
    }

    #[test]
    fn link_and_unlink_are_idempotent() {
        let mut product = new_product().into_product(ProductId::new(), Vec::new());
        let other = ProductId::new();

        assert!(product.link(other));
        assert!(!product.link(other));
        assert_eq!(product.similar_products, vec![other]);

        assert!(product.unlink(other));
        assert!(!product.unlink(other));
        assert!(product.similar_products.is_empty());
    }

    #[test]
    fn field_edits_validate_and_apply() {
        let config = CatalogConfig::default();
        let mut product = new_product().into_product(ProductId::new(), Vec::new());

        assert!(ProductField::Description(String::new()).validate(&config).is_err());
        assert!(ProductField::Price(0).validate(&config).is_err());
        assert!(ProductField::Quantity(0).validate(&config).is_ok());

        ProductField::Category(Category::Clothing).apply(&mut product);
        ProductField::Name(" Road Shoe ".to_string()).apply(&mut product);
        assert_eq!(product.category, Category::Clothing);
        assert_eq!(product.name, "Road Shoe");
    }
}
