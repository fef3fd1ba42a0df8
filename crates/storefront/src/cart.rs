//! Cart state container.
//!
//! The cart lives for one storefront session and is never persisted. Every
//! mutation is staged on a copy of the lines and committed together with its
//! totals, so readers never see totals out of step with the items. A change
//! whose totals would not be representable is rejected and leaves the cart
//! as it was.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use club_clothing_core::ProductId;

use crate::models::Product;

/// Rejected cart changes. The cart is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity {0} is too large")]
    QuantityTooLarge(i64),

    #[error("product {0} has a negative price")]
    NegativePrice(ProductId),

    #[error("cart total is too large")]
    TotalOverflow,
}

/// One line in the cart. At most one line exists per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub image_url: String,
    pub price: Decimal,
    /// Always at least 1; a line that would reach 0 is removed instead.
    pub quantity: u32,
}

impl CartItem {
    fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image_url: product.image_url.clone(),
            price: product.price,
            quantity: 1,
        }
    }

    /// `price × quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// The shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    total_count: u64,
    total_price: Decimal,
    is_visible: bool,
}

impl Cart {
    /// An empty, hidden cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Lines in the order they were first added.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Sum of quantities.
    #[must_use]
    pub const fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Sum of `price × quantity`.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.is_visible
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`, appending a new line if it is not in the
    /// cart yet.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the price is negative or the line or cart
    /// total would overflow.
    pub fn add_item(&mut self, product: &Product) -> Result<(), CartError> {
        if product.price < Decimal::ZERO {
            return Err(CartError::NegativePrice(product.id.clone()));
        }

        let mut items = self.items.clone();
        match items.iter_mut().find(|item| item.product_id == product.id) {
            Some(item) => item.quantity = increment(item.quantity)?,
            None => items.push(CartItem::from_product(product)),
        }
        self.commit(items)
    }

    /// Remove a product's line. No-op if absent.
    pub fn remove_item(&mut self, product_id: &ProductId) {
        let mut items = self.items.clone();
        items.retain(|item| &item.product_id != product_id);
        self.commit_shrunk(items);
    }

    /// Set a line's quantity. Zero or less removes the line; an absent
    /// product is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if `quantity` does not fit a line or the totals
    /// would overflow.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove_item(product_id);
            return Ok(());
        }

        let quantity = u32::try_from(quantity).map_err(|_| CartError::QuantityTooLarge(quantity))?;
        let mut items = self.items.clone();
        if let Some(item) = items.iter_mut().find(|item| &item.product_id == product_id) {
            item.quantity = quantity;
        }
        self.commit(items)
    }

    /// One more unit of an existing line. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the line is already at its maximum quantity or
    /// the totals would overflow.
    pub fn increase_quantity(&mut self, product_id: &ProductId) -> Result<(), CartError> {
        let mut items = self.items.clone();
        if let Some(item) = items.iter_mut().find(|item| &item.product_id == product_id) {
            item.quantity = increment(item.quantity)?;
        }
        self.commit(items)
    }

    /// One fewer unit of an existing line; the line is removed when it
    /// reaches zero. No-op if absent.
    pub fn decrease_quantity(&mut self, product_id: &ProductId) {
        let mut items = self.items.clone();
        if let Some(item) = items.iter_mut().find(|item| &item.product_id == product_id) {
            item.quantity -= 1;
        }
        items.retain(|item| item.quantity > 0);
        self.commit_shrunk(items);
    }

    /// Flip whether the cart panel is shown. Items are untouched.
    pub const fn toggle_visibility(&mut self) {
        self.is_visible = !self.is_visible;
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total_count = 0;
        self.total_price = Decimal::ZERO;
    }

    /// Replace the lines and totals together, or leave the cart untouched.
    fn commit(&mut self, items: Vec<CartItem>) -> Result<(), CartError> {
        let (total_count, total_price) = totals(&items)?;
        self.items = items;
        self.total_count = total_count;
        self.total_price = total_price;
        Ok(())
    }

    /// Commit a change that only lowers quantities.
    ///
    /// Prices are never negative, so these totals are bounded by the current
    /// ones and always representable.
    fn commit_shrunk(&mut self, items: Vec<CartItem>) {
        if let Err(e) = self.commit(items) {
            tracing::warn!(error = %e, "cart change rejected");
        }
    }
}

fn increment(quantity: u32) -> Result<u32, CartError> {
    quantity
        .checked_add(1)
        .ok_or_else(|| CartError::QuantityTooLarge(i64::from(quantity) + 1))
}

fn totals(items: &[CartItem]) -> Result<(u64, Decimal), CartError> {
    let mut count = 0_u64;
    let mut price = Decimal::ZERO;
    for item in items {
        count = count
            .checked_add(u64::from(item.quantity))
            .ok_or(CartError::TotalOverflow)?;
        price = item
            .line_total()
            .and_then(|line| price.checked_add(line))
            .ok_or(CartError::TotalOverflow)?;
    }
    Ok((count, price))
}
