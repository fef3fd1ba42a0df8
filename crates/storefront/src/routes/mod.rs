//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                           - Health check
//!
//! # Catalog
//! GET    /                                 - Category overview
//! GET    /explore                          - All categories with products
//! GET    /category/{id}                    - One category
//!
//! # Session
//! GET    /session                          - Current session state
//! POST   /login                            - Email/password sign-in
//! POST   /login/google                     - Google sign-in
//! POST   /sign-up                          - Create account
//! POST   /logout                           - Sign out
//!
//! # Cart
//! GET    /cart                             - Cart contents and totals
//! POST   /cart/items                       - Add one unit of a product
//! PUT    /cart/items/{product_id}          - Set quantity (<= 0 removes)
//! DELETE /cart/items/{product_id}          - Remove line
//! POST   /cart/items/{product_id}/increase - One more unit
//! POST   /cart/items/{product_id}/decrease - One fewer unit
//! POST   /cart/toggle                      - Show/hide the cart panel
//!
//! # Checkout
//! GET    /checkout                         - Checkout summary (requires auth)
//! GET    /payment-confirmation             - Payment gateway return URL
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the session routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(auth::session))
        .route("/login", post(auth::login))
        .route("/login/google", post(auth::login_with_google))
        .route("/sign-up", post(auth::sign_up))
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove),
        )
        .route("/items/{product_id}/increase", post(cart::increase))
        .route("/items/{product_id}/decrease", post(cart::decrease))
        .route("/toggle", post(cart::toggle))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/", get(catalog::home))
        .route("/explore", get(catalog::explore))
        .route("/category/{id}", get(catalog::show))
        // Session
        .merge(auth_routes())
        // Cart
        .nest("/cart", cart_routes())
        // Checkout
        .route("/checkout", get(checkout::checkout))
        .route(
            "/payment-confirmation",
            get(checkout::payment_confirmation),
        )
}

/// The full application: routes, health check, and middleware.
///
/// Sentry layers are added by the binary, outermost.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request| {
            info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the backend.
async fn health() -> &'static str {
    "ok"
}
