//! HTTP route handlers for the storefront.
//!
//! All responses use the uniform JSON envelope
//! `{ success, message, data?, errors? }`.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness check
//! GET    /health/ready         - Readiness check (db ping)
//!
//! # Catalog
//! GET    /albums               - Album listing
//! GET    /albums/{id}          - Album detail
//!
//! # Cart
//! GET    /cart                 - Current owner's cart
//! POST   /cart/items           - Add an album (upserts the line)
//! PUT    /cart/items/{id}      - Set a line's quantity
//! DELETE /cart/items/{id}      - Remove a line
//! DELETE /cart                 - Clear the cart
//!
//! # Checkout wizard (session-held state machine)
//! GET    /checkout             - Current wizard state
//! POST   /checkout/billing     - Submit billing details
//! POST   /checkout/payment     - Submit payment details
//! POST   /checkout/back        - Navigate one step back
//! POST   /checkout/place       - Place the order (single-shot)
//!
//! # Orders (requires auth)
//! POST   /orders               - Direct API checkout
//! GET    /orders               - Order history
//! GET    /orders/{id}          - Order detail
//!
//! # Auth
//! POST   /auth/login           - Accept an identity-provider user id; merges
//!                                the anonymous cart into the user's cart
//! POST   /auth/logout          - Clear the session user
//! ```

pub mod albums;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the album routes router.
pub fn album_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(albums::index))
        .route("/{id}", get(albums::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route("/items/{id}", put(cart::update).delete(cart::remove))
}

/// Create the checkout wizard routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/billing", post(checkout::billing))
        .route("/payment", post(checkout::payment))
        .route("/back", post(checkout::back))
        .route("/place", post(checkout::place))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/albums", album_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .route("/orders", get(orders::index).post(orders::create))
        .route("/orders/{id}", get(orders::show))
}
