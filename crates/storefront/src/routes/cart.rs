//! Cart route handlers.
//!
//! Every mutation runs under the cart lock and responds with the whole cart,
//! totals included.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use club_clothing_core::ProductId;

use crate::cart::{Cart, CartError};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Body of `POST /cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
}

/// Body of `PUT /cart/items/{product_id}`.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// Run `f` on the cart and return a snapshot.
async fn mutate(state: &AppState, f: impl FnOnce(&mut Cart)) -> Json<Cart> {
    let mut cart = state.cart().lock().await;
    f(&mut cart);
    Json(cart.clone())
}

/// Run a change that can be rejected; a rejected change leaves the cart as
/// it was.
async fn try_mutate(
    state: &AppState,
    f: impl FnOnce(&mut Cart) -> std::result::Result<(), CartError>,
) -> Result<Json<Cart>> {
    let mut cart = state.cart().lock().await;
    f(&mut cart)?;
    Ok(Json(cart.clone()))
}

/// Display the cart.
pub async fn show(State(state): State<AppState>) -> Json<Cart> {
    Json(state.cart().lock().await.clone())
}

/// Add one unit of a catalog product.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Cart>> {
    let product = state
        .catalog()
        .product(&request.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", request.product_id)))?;

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", product.id.as_str())]),
    );
    try_mutate(&state, |cart| cart.add_item(&product)).await
}

/// Set a line's quantity; zero or less removes it.
#[instrument(skip(state))]
pub async fn set_quantity(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<Cart>> {
    try_mutate(&state, |cart| cart.set_quantity(&product_id, request.quantity)).await
}

/// Remove a line.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Json<Cart> {
    add_breadcrumb(
        "cart",
        "Removed item",
        Some(&[("product_id", product_id.as_str())]),
    );
    mutate(&state, |cart| cart.remove_item(&product_id)).await
}

/// One more unit of a line.
pub async fn increase(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Cart>> {
    try_mutate(&state, |cart| cart.increase_quantity(&product_id)).await
}

/// One fewer unit of a line.
pub async fn decrease(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Json<Cart> {
    mutate(&state, |cart| cart.decrease_quantity(&product_id)).await
}

/// Show or hide the cart panel.
pub async fn toggle(State(state): State<AppState>) -> Json<Cart> {
    mutate(&state, Cart::toggle_visibility).await
}
