//! Catalog route handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use club_clothing_core::CategoryId;

use crate::error::{AppError, Result};
use crate::models::Category;
use crate::state::AppState;

/// A category tile on the home page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTile {
    pub id: CategoryId,
    pub name: String,
    pub display_name: String,
    pub image_url: String,
}

impl From<&Category> for CategoryTile {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
            display_name: category.display_name.clone(),
            image_url: category.image_url.clone(),
        }
    }
}

/// Home page: one tile per category.
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> Result<Json<Vec<CategoryTile>>> {
    let categories = state.catalog().categories().await?;
    Ok(Json(categories.iter().map(CategoryTile::from).collect()))
}

/// Explore page: every category with its products.
#[instrument(skip(state))]
pub async fn explore(State(state): State<AppState>) -> Result<Json<Arc<Vec<Category>>>> {
    Ok(Json(state.catalog().categories().await?))
}

/// Category details.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<Category>> {
    state
        .catalog()
        .category(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))
}
