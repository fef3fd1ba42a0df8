//! Checkout route handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cart::Cart;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::checkout::{CheckoutSummary, PaymentStatus};
use crate::state::AppState;

/// Query string the payment gateway appends to the return URL.
#[derive(Debug, Default, Deserialize)]
pub struct PaymentConfirmationQuery {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub canceled: Option<bool>,
}

impl PaymentConfirmationQuery {
    fn status(&self) -> Option<PaymentStatus> {
        if self.success == Some(true) {
            Some(PaymentStatus::Success)
        } else if self.canceled == Some(true) {
            Some(PaymentStatus::Canceled)
        } else {
            None
        }
    }
}

/// Response of the payment confirmation page.
#[derive(Debug, Serialize)]
pub struct PaymentConfirmation {
    pub status: PaymentStatus,
    pub cart: Cart,
}

/// Checkout summary. Signed-in visitors only.
#[instrument(skip_all)]
pub async fn checkout(
    RequireAuth(_session): RequireAuth,
    State(state): State<AppState>,
) -> Json<CheckoutSummary> {
    let cart = state.cart().lock().await;
    Json(state.checkout().summary(&cart))
}

/// Payment gateway return URL.
#[instrument(skip(state))]
pub async fn payment_confirmation(
    State(state): State<AppState>,
    Query(query): Query<PaymentConfirmationQuery>,
) -> Result<Json<PaymentConfirmation>> {
    let status = query
        .status()
        .ok_or_else(|| AppError::BadRequest("expected success=true or canceled=true".into()))?;

    let mut cart = state.cart().lock().await;
    let status = state.checkout().confirm_payment(status, &mut cart);
    Ok(Json(PaymentConfirmation {
        status,
        cart: cart.clone(),
    }))
}
