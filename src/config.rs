use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Catalog configuration
///
/// Builder-style setters start from [`CatalogConfig::default`];
/// [`CatalogConfig::from_env`] reads `CATALOG_*` variables.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Lowest accepted price, in cents
    pub min_price_cents: u64,

    /// Maximum images per product (the minimum is always one)
    pub max_images: usize,

    /// Maximum similar-product edges per product
    pub max_similar_products: usize,

    /// Leading path segment for generated image paths
    pub image_path_prefix: String,

    /// How many post-commit file operations may run at once
    pub upload_concurrency: usize,

    /// Snapshot and file root; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,

    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            min_price_cents: 1,
            max_images: 3,
            max_similar_products: 32,
            image_path_prefix: "images".to_string(),
            upload_concurrency: 1,
            data_dir: None,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            min_price_cents: env_parse("CATALOG_MIN_PRICE_CENTS", defaults.min_price_cents)?,
            max_images: env_parse("CATALOG_MAX_IMAGES", defaults.max_images)?,
            max_similar_products: env_parse("CATALOG_MAX_SIMILAR", defaults.max_similar_products)?,
            image_path_prefix: env_string("CATALOG_IMAGE_PREFIX", &defaults.image_path_prefix),
            upload_concurrency: env_parse(
                "CATALOG_UPLOAD_CONCURRENCY",
                defaults.upload_concurrency,
            )?,
            data_dir: std::env::var("CATALOG_DATA_DIR").ok().map(PathBuf::from),
            default_page_size: env_parse("CATALOG_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,
            max_page_size: env_parse("CATALOG_MAX_PAGE_SIZE", defaults.max_page_size)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_images == 0 {
            bail!("max_images must be at least 1");
        }
        if self.upload_concurrency == 0 {
            bail!("upload_concurrency must be at least 1");
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            bail!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            );
        }
        if self.image_path_prefix.trim_matches('/').is_empty() {
            bail!("image_path_prefix must not be empty");
        }
        Ok(())
    }

    /// Set the minimum price in cents
    pub fn min_price_cents(mut self, cents: u64) -> Self {
        self.min_price_cents = cents;
        self
    }

    /// Set the maximum number of images per product
    pub fn max_images(mut self, max: usize) -> Self {
        self.max_images = max;
        self
    }

    /// Set the maximum number of similar products
    pub fn max_similar_products(mut self, max: usize) -> Self {
        self.max_similar_products = max;
        self
    }

    /// Set the image path prefix
    pub fn image_path_prefix(mut self, prefix: &str) -> Self {
        self.image_path_prefix = prefix.to_string();
        self
    }

    /// Set post-commit file operation concurrency
    pub fn upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency;
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("catalog.snapshot"))
    }

    pub fn files_root(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("files"))
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid {}", key, std::any::type_name::<T>())),
        Err(_) => Ok(default),
    }
}
