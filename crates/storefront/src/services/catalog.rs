//! Catalog service.
//!
//! Reads categories (with their embedded products) from the document store.
//! Results are cached for 5 minutes using `moka`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, info, instrument};

use club_clothing_core::{CategoryId, ProductId};

use crate::backend::{DocumentStore, DocumentStoreError, Filter, collections, documents};
use crate::models::{Category, Product};

/// Errors from catalog reads and seeding.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Document store request failed.
    #[error("document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// A category document did not have the expected shape.
    #[error("invalid category document: {0}")]
    Decode(String),

    /// Seed file could not be read.
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    /// Seed file is not a JSON array of categories.
    #[error("invalid seed file: {0}")]
    SeedFormat(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Category(CategoryId),
}

#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Category(Option<Box<Category>>),
}

/// Catalog reads over the `categories` collection.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    documents: Arc<dyn DocumentStore>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    /// Create a new catalog service.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { documents, cache }),
        }
    }

    /// Every category, in store order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the store request fails or a document is
    /// malformed.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, CatalogError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(
            self.inner
                .documents
                .list(collections::CATEGORIES)
                .await?
                .into_iter()
                .map(decode_category)
                .collect::<Result<Vec<_>, _>>()?,
        );

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;

        Ok(categories)
    }

    /// The category with the given id, if any.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the store request fails or the document is
    /// malformed.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn category(&self, id: &CategoryId) -> Result<Option<Category>, CatalogError> {
        let cache_key = CacheKey::Category(id.clone());
        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(category.map(|c| *c));
        }

        let category = self
            .inner
            .documents
            .query(collections::CATEGORIES, &Filter::eq("id", id.as_str()))
            .await?
            .into_iter()
            .next()
            .map(decode_category)
            .transpose()?;

        self.inner
            .cache
            .insert(
                cache_key,
                CacheValue::Category(category.clone().map(Box::new)),
            )
            .await;

        Ok(category)
    }

    /// Find a product in any category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the categories cannot be loaded.
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, CatalogError> {
        Ok(self
            .categories()
            .await?
            .iter()
            .find_map(|category| category.product(id).cloned()))
    }

    /// Store categories whose id is not in the store yet, then drop cached
    /// reads. Existing categories are left as they are, so seeding twice is
    /// harmless. Returns how many categories were written.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if a lookup or insert fails; earlier inserts
    /// are kept.
    #[instrument(skip_all, fields(count = categories.len()))]
    pub async fn seed(&self, categories: &[Category]) -> Result<usize, CatalogError> {
        let mut written = 0;
        for category in categories {
            let existing = self
                .inner
                .documents
                .query(
                    collections::CATEGORIES,
                    &Filter::eq("id", category.id.as_str()),
                )
                .await?;
            if !existing.is_empty() {
                debug!(category_id = %category.id, "category already stored, skipping");
                continue;
            }

            self.inner
                .documents
                .insert(collections::CATEGORIES, documents::encode(category)?)
                .await?;
            written += 1;
        }
        self.invalidate_all().await;
        info!(written, "catalog seeded");
        Ok(written)
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

/// Read a JSON array of categories.
///
/// # Errors
///
/// Returns `CatalogError::Io` or `CatalogError::SeedFormat`.
pub async fn read_seed_file(path: &Path) -> Result<Vec<Category>, CatalogError> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

fn decode_category(document: documents::Document) -> Result<Category, CatalogError> {
    documents::decode(document).map_err(|e| CatalogError::Decode(e.to_string()))
}
