//! Cart route handlers.
//!
//! Every handler locks the cart for exactly one operation and answers with
//! the resulting [`CartView`]. Snapshot saves happen in the background; a
//! failed save is logged by the cart store and never fails the request.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use cartwheel_cart::{CartState, ProductCandidate};
use cartwheel_core::{Price, ProductId};
use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{instrument, warn};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Cart line display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub id: ProductId,
    pub title: String,
    pub image: String,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
}

/// Cart display data.
///
/// Tax is a display-only multiplier; it never enters the cart state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u64,
    pub item_label: String,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
}

impl CartView {
    /// Build the view for `state` with the given tax rate (0.08 = 8%).
    #[must_use]
    pub fn new(state: &CartState, tax_rate: Decimal) -> Self {
        let subtotal = state.total_amount();
        let tax = subtotal.saturating_mul(tax_rate);
        let count = state.total_quantity();

        Self {
            items: state
                .items()
                .iter()
                .map(|line| CartItemView {
                    id: line.id.clone(),
                    title: line.title.clone(),
                    image: line.image.clone(),
                    quantity: line.quantity,
                    price: Price::usd(line.price).to_string(),
                    line_price: Price::usd(line.line_total()).to_string(),
                })
                .collect(),
            item_count: count,
            item_label: if count == 1 {
                "1 item".to_string()
            } else {
                format!("{count} items")
            },
            subtotal: Price::usd(subtotal).to_string(),
            shipping: "Free".to_string(),
            tax: Price::usd(tax).to_string(),
            total: Price::usd(subtotal.saturating_add(tax)).to_string(),
        }
    }
}

/// Add to cart request.
///
/// Either a catalog id to look up, or a full product record. Extra product
/// fields (rating, description, ...) are accepted and ignored.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AddToCartRequest {
    ByProductId { product_id: ProductId },
    Product(ProductCandidate),
}

/// Update quantity request.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

fn parse_id(raw: &str) -> Result<ProductId> {
    ProductId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn view(state: &AppState, snapshot: &CartState) -> Json<CartView> {
    Json(CartView::new(snapshot, state.config().cart.tax_rate))
}

/// Display the cart.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Json<CartView> {
    let snapshot = state.cart().await.snapshot();
    view(&state, &snapshot)
}

/// Add one unit of a product.
#[instrument(skip(state))]
pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let candidate = match request {
        AddToCartRequest::ByProductId { product_id } => {
            let product = state.catalog().get_product(&product_id).await?;
            ProductCandidate::from(product.as_ref())
        }
        AddToCartRequest::Product(candidate) => candidate,
    };

    let snapshot = state.cart().await.add_item(candidate)?;
    Ok(view(&state, &snapshot))
}

/// Set a line's quantity. Zero or less removes the line.
#[instrument(skip(state))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    let id = parse_id(&id)?;
    let snapshot = state.cart().await.set_quantity(&id, request.quantity)?;
    Ok(view(&state, &snapshot))
}

/// Remove a line.
///
/// Unknown ids answer with the unchanged cart, and the unchanged state is
/// still saved like any other transition.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CartView>> {
    let id = parse_id(&id)?;
    let snapshot = state.cart().await.remove_item(&id);
    Ok(view(&state, &snapshot))
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(State(state): State<AppState>) -> Json<CartView> {
    let snapshot = state.cart().await.clear();
    view(&state, &snapshot)
}

/// Stream cart updates as server-sent `cart` events.
///
/// The current cart is sent immediately, then one event per change. The
/// stream ends when the server begins shutting down.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.cart().await.subscribe();
    let tax_rate = state.config().cart.tax_rate;

    let stream = view_updates(rx, tax_rate, state.shutdown_signal()).map(|view| {
        Ok(Event::default()
            .event("cart")
            .json_data(&view)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to serialize cart event");
                Event::default().event("error")
            }))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// One `CartView` for the current state, then one per published change,
/// until `shutdown` turns `true`.
fn view_updates(
    mut rx: watch::Receiver<Arc<CartState>>,
    tax_rate: Decimal,
    shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = CartView> {
    rx.mark_changed();
    futures::stream::unfold(rx, move |mut rx| async move {
        rx.changed().await.ok()?;
        let view = CartView::new(&rx.borrow_and_update(), tax_rate);
        Some((view, rx))
    })
    .take_until(shutdown_requested(shutdown))
}

async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    // A dropped sender also ends the stream.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
