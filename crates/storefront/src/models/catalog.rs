//! Catalog documents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use club_clothing_core::{CategoryId, CurrencyCode, Price, ProductId};

/// A product as embedded in its category document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price. Stored as a number in the document store and accepted as
    /// either a number or a decimal string.
    pub price: Decimal,
    pub image_url: String,
}

impl Product {
    /// Unit price in the store currency.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::new(self.price, CurrencyCode::default())
    }
}

/// A product category with its products, stored in the `categories`
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    /// URL slug, e.g. `"jackets"`.
    pub name: String,
    pub display_name: String,
    pub image_url: String,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Category {
    /// Find a product in this category.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|product| &product.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_category_accepts_numeric_and_string_prices() {
        let category: Category = serde_json::from_value(serde_json::json!({
            "id": "jackets",
            "name": "jackets",
            "displayName": "Jaquetas",
            "imageUrl": "https://img/jackets.jpg",
            "products": [
                {"id": "p1", "name": "Parka", "price": 250, "imageUrl": "https://img/p1.jpg"},
                {"id": "p2", "name": "Denim", "price": "89.90", "imageUrl": "https://img/p2.jpg"}
            ]
        }))
        .unwrap();

        assert_eq!(category.products.len(), 2);
        assert_eq!(category.products[0].price, Decimal::from(250));
        assert_eq!(category.products[1].price, Decimal::new(8990, 2));
        assert_eq!(
            category.product(&ProductId::new("p2")).unwrap().name,
            "Denim"
        );
        assert!(category.product(&ProductId::new("p9")).is_none());
    }

    #[test]
    fn test_category_without_products() {
        let category: Category = serde_json::from_value(serde_json::json!({
            "id": "hats",
            "name": "hats",
            "displayName": "Bonés",
            "imageUrl": "https://img/hats.jpg"
        }))
        .unwrap();
        assert!(category.products.is_empty());
    }

    #[test]
    fn test_unit_price_display() {
        let product = Product {
            id: ProductId::new("p1"),
            name: "Parka".to_owned(),
            price: Decimal::new(2505, 1),
            image_url: String::new(),
        };
        assert_eq!(product.unit_price().to_string(), "R$ 250.50");
    }
}
