//! Seed the catalog from a JSON file.
//!
//! The file holds an array of categories, each with its products, in the
//! same shape the storefront serves from `/explore`.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info};

use club_clothing_storefront::models::Category;
use club_clothing_storefront::services::CatalogService;
use club_clothing_storefront::services::catalog::{CatalogError, read_seed_file};

use super::connect;

/// Catalog seeding errors.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] club_clothing_storefront::config::ConfigError),
}

/// Seed categories from `path`.
///
/// # Errors
///
/// Returns an error if the file is missing or malformed, fails validation,
/// or the document store rejects a write.
pub async fn seed(path: &Path, dry_run: bool) -> Result<(), SeedError> {
    if !path.exists() {
        return Err(SeedError::NotFound(path.display().to_string()));
    }

    info!(path = %path.display(), "Loading catalog from file");
    let categories = read_seed_file(path).await?;
    let products: usize = categories.iter().map(|c| c.products.len()).sum();
    info!(categories = categories.len(), products, "Parsed catalog");

    let errors = validate(&categories);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }
    info!("Catalog validated successfully");

    if dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let backend = connect()?;
    let catalog = CatalogService::new(backend.documents);
    let written = catalog.seed(&categories).await?;

    info!(
        written,
        skipped = categories.len() - written,
        "Catalog seeded"
    );
    Ok(())
}

/// Check a seed for problems the storefront would otherwise surface at
/// request time.
fn validate(categories: &[Category]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut category_ids = HashSet::new();
    let mut product_ids = HashSet::new();

    for category in categories {
        if !category_ids.insert(category.id.as_str()) {
            errors.push(format!("duplicate category id '{}'", category.id));
        }
        if category.name.trim().is_empty() {
            errors.push(format!("category '{}' has no name", category.id));
        }

        for product in &category.products {
            if !product_ids.insert(product.id.as_str()) {
                errors.push(format!("duplicate product id '{}'", product.id));
            }
            if product.name.trim().is_empty() {
                errors.push(format!("product '{}' has no name", product.id));
            }
            if product.price < Decimal::ZERO {
                errors.push(format!(
                    "product '{}' has a negative price ({})",
                    product.id, product.price
                ));
            }
        }
    }

    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn seed_json() -> serde_json::Value {
        serde_json::json!([
            {
                "id": "hats",
                "name": "hats",
                "displayName": "Hats",
                "imageUrl": "https://img.example/hats.png",
                "products": [
                    { "id": "1", "name": "Brown Brim", "price": "25", "imageUrl": "https://img.example/brim.png" },
                    { "id": "2", "name": "Blue Beanie", "price": 18, "imageUrl": "https://img.example/beanie.png" }
                ]
            }
        ])
    }

    fn categories(value: serde_json::Value) -> Vec<Category> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_seed() {
        assert!(validate(&categories(seed_json())).is_empty());
    }

    #[test]
    fn test_duplicate_ids() {
        let mut value = seed_json();
        let hats = value[0].clone();
        value.as_array_mut().unwrap().push(hats);

        let errors = validate(&categories(value));
        assert!(errors.iter().any(|e| e.contains("duplicate category id 'hats'")));
        assert!(errors.iter().any(|e| e.contains("duplicate product id '1'")));
    }

    #[test]
    fn test_negative_price_and_blank_name() {
        let mut value = seed_json();
        value[0]["products"][0]["price"] = serde_json::json!("-1");
        value[0]["products"][1]["name"] = serde_json::json!("  ");

        let errors = validate(&categories(value));
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("negative price"));
        assert!(errors[1].contains("has no name"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = seed(Path::new("/nonexistent/catalog.json"), true).await;
        assert!(matches!(result, Err(SeedError::NotFound(_))));
    }
}
