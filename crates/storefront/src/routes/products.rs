//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use cartwheel_core::{Product, ProductId};
use serde::Deserialize;
use tracing::instrument;

use crate::catalog::ProductSort;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    /// Category name; `all` or absent means every category.
    pub category: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
}

/// List products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Product>>> {
    let category = query
        .category
        .as_deref()
        .filter(|name| !name.is_empty() && *name != "all");

    let products = state.catalog().list_products(category).await?;
    let mut products = products.as_ref().clone();
    query.sort.apply(&mut products);

    Ok(Json(products))
}

/// List category names.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    let categories = state.catalog().categories().await?;
    Ok(Json(categories.as_ref().clone()))
}

/// Product detail.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    let id = ProductId::parse(&id).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let product = state.catalog().get_product(&id).await?;
    Ok(Json(product.as_ref().clone()))
}
