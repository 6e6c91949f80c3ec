//! Order domain types.
//!
//! An order snapshots everything it needs at creation time: the shipping
//! address and per-line product name/price. Later catalog edits never
//! retroactively alter a historical order.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use driftwood_core::{AccountId, OrderId, OrderItemId, OrderStatus, Price};

use super::address::ShippingAddress;
use crate::cart::CartItem;

/// A durably recorded order (domain type).
///
/// Immutable once created except for [`status`](Self::status), which the
/// finalizer compensates to `Failed` on partial completion and downstream
/// fulfillment advances afterwards.
#[derive(Debug, Clone)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Account that placed the order.
    pub account_id: AccountId,
    /// Lifecycle status; created as `Pending`.
    pub status: OrderStatus,
    /// Shipping address snapshot taken at creation.
    pub shipping: ShippingAddress,
    /// Cart total at the instant the order was created.
    pub total: Price,
    /// Deduplication key derived from the checkout session.
    pub idempotency_key: Uuid,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// A recorded order line (domain type).
#[derive(Debug, Clone)]
pub struct OrderLineItem {
    /// Unique line item ID.
    pub id: OrderItemId,
    /// Order this line belongs to.
    pub order_id: OrderId,
    /// Catalog product identifier.
    pub product_id: String,
    /// Variant label (e.g. size), if the product has variants.
    pub variant: Option<String>,
    /// Product name snapshot at order time.
    pub name: String,
    /// Unit price snapshot at order time.
    pub unit_price: Price,
    /// Quantity ordered.
    pub quantity: u32,
}

/// Input for creating one order line from a cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: String,
    pub variant: Option<String>,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
}

impl From<&CartItem> for NewOrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant: item.variant.clone(),
            name: item.name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}
