//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Health check
//!
//! # Products
//! GET    /products               - Product listing (?category=&sort=)
//! GET    /products/categories    - Category names
//! GET    /products/{id}          - Product detail
//!
//! # Cart
//! GET    /cart                   - Cart with display totals
//! POST   /cart/items             - Add one unit of a product
//! PATCH  /cart/items/{id}        - Set line quantity (<= 0 removes)
//! DELETE /cart/items/{id}        - Remove line
//! DELETE /cart                   - Clear cart
//! GET    /cart/events            - Server-sent cart updates
//! ```

pub mod cart;
pub mod products;

use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/categories", get(products::categories))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", patch(cart::update).delete(cart::remove))
        .route("/events", get(cart::events))
}

/// Create the full application router with tracing and request ids.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
