//! Checkout service.
//!
//! Summarizes the cart for the checkout view and applies the outcome the
//! payment gateway reports back on its return URL. Creating the gateway
//! session itself happens outside the storefront.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use club_clothing_core::{CurrencyCode, Price};

use crate::cart::{Cart, CartItem};

/// What the checkout view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub items: Vec<CartItem>,
    pub total_count: u64,
    pub total_price: Decimal,
    /// `total_price` formatted for display, e.g. `R$ 20.00`.
    pub formatted_total: String,
}

/// Outcome reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentStatus {
    Success,
    Canceled,
}

/// Checkout operations over the session cart.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutService {
    currency: CurrencyCode,
}

impl CheckoutService {
    /// A checkout service pricing in the store currency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarize the cart.
    #[must_use]
    pub fn summary(&self, cart: &Cart) -> CheckoutSummary {
        CheckoutSummary {
            items: cart.items().to_vec(),
            total_count: cart.total_count(),
            total_price: cart.total_price(),
            formatted_total: Price::new(cart.total_price(), self.currency).to_string(),
        }
    }

    /// Apply a payment outcome. A successful payment empties the cart.
    pub fn confirm_payment(&self, status: PaymentStatus, cart: &mut Cart) -> PaymentStatus {
        if status == PaymentStatus::Success {
            info!(
                items = cart.items().len(),
                total = %cart.total_price(),
                "payment confirmed, clearing cart"
            );
            cart.clear();
        }
        status
    }
}
