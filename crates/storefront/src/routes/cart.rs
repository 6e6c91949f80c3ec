//! Cart route handlers.
//!
//! Every handler loads the cart from the session, applies the mutation
//! through [`SessionCart`] (which persists the snapshot synchronously), and
//! returns the updated view. Cart operations never fail on persistence: a
//! failed snapshot write is logged and retried on the next mutation.

use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use driftwood_core::Price;

use crate::cart::{CartError, CartItem, CartStore, session::SessionCart};
use crate::error::{AppError, Result};

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: String,
    pub variant: Option<String>,
    pub name: String,
    pub unit_price: String,
    pub line_total: String,
    pub quantity: u32,
    pub image_url: Option<String>,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&CartStore> for CartView {
    fn from(cart: &CartStore) -> Self {
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            subtotal: cart.total_price().to_string(),
            item_count: cart.item_count(),
        }
    }
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant: item.variant.clone(),
            name: item.name.clone(),
            unit_price: item.unit_price.to_string(),
            line_total: item.line_total().to_string(),
            quantity: item.quantity,
            image_url: item.image_url.clone(),
        }
    }
}

/// Add to cart payload.
///
/// Carries the product snapshot (name, price, image) because catalog lookups
/// live in the frontend; the cart stores what it is told.
#[derive(Debug, Deserialize)]
pub struct AddToCartPayload {
    pub product_id: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub name: String,
    pub unit_price: Price,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Update quantity payload.
#[derive(Debug, Deserialize)]
pub struct UpdateCartPayload {
    pub product_id: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: u32,
}

/// Remove line payload.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartPayload {
    pub product_id: String,
    #[serde(default)]
    pub variant: Option<String>,
}

/// Cart count badge data.
#[derive(Debug, Serialize)]
pub struct CartCountView {
    pub count: u32,
}

/// Display the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> impl IntoResponse {
    let cart = SessionCart::load(session).await;
    Json(CartView::from(cart.cart()))
}

/// Add an item to the cart.
///
/// Merges into an existing line with the same `(product_id, variant)`.
#[instrument(skip(session, payload))]
pub async fn add(session: Session, Json(payload): Json<AddToCartPayload>) -> Result<Json<CartView>> {
    let quantity = payload.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }

    let mut cart = SessionCart::load(session).await;
    cart.add_item(CartItem {
        product_id: payload.product_id,
        variant: payload.variant,
        name: payload.name,
        unit_price: payload.unit_price,
        quantity,
        image_url: payload.image_url,
    })
    .await;

    Ok(Json(CartView::from(cart.cart())))
}

/// Update a cart line's quantity.
#[instrument(skip(session, payload))]
pub async fn update(
    session: Session,
    Json(payload): Json<UpdateCartPayload>,
) -> Result<Json<CartView>> {
    let mut cart = SessionCart::load(session).await;
    cart.update_quantity(&payload.product_id, payload.variant.as_deref(), payload.quantity)
        .await
        .map_err(|e: CartError| AppError::BadRequest(e.to_string()))?;

    Ok(Json(CartView::from(cart.cart())))
}

/// Remove a line from the cart. Removing a line that isn't there is a no-op.
#[instrument(skip(session, payload))]
pub async fn remove(
    session: Session,
    Json(payload): Json<RemoveFromCartPayload>,
) -> Json<CartView> {
    let mut cart = SessionCart::load(session).await;
    cart.remove_item(&payload.product_id, payload.variant.as_deref())
        .await;

    Json(CartView::from(cart.cart()))
}

/// Get the cart count badge.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Json<CartCountView> {
    let cart = SessionCart::load(session).await;
    Json(CartCountView {
        count: cart.cart().item_count(),
    })
}
