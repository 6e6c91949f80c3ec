//! Route handlers for the storefront API surface.
//!
//! The storefront exposes thin JSON handlers over the cart and checkout
//! core; page rendering is a separate frontend's concern.

pub mod auth;
pub mod cart;
pub mod checkout;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the storefront router.
#[must_use]
pub fn routes() -> Router<AppState> {
    Router::new()
        // Cart
        .route("/cart", get(cart::show))
        .route("/cart/items", post(cart::add))
        .route("/cart/items/update", post(cart::update))
        .route("/cart/items/remove", post(cart::remove))
        .route("/cart/count", get(cart::count))
        // Checkout
        .route("/checkout", post(checkout::begin))
        .route("/checkout/shipping", post(checkout::shipping))
        .route("/checkout/login", post(checkout::login))
        .route("/checkout/guest", post(checkout::guest))
        .route("/checkout/place-order", post(checkout::place_order))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
}
