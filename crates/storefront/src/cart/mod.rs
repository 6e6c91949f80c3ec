//! Shopper cart state.
//!
//! [`CartStore`] is a plain in-memory container owned by the shopper's
//! session and passed by reference to whoever needs it; there is no shared
//! global cart. Persistence is handled by the [`session`] wrapper, which
//! writes the full [`CartSnapshot`] back to the session store after every
//! mutation.

pub mod session;

use serde::{Deserialize, Serialize};

use driftwood_core::Price;

/// One line in the cart.
///
/// Line identity is the pair `(product_id, variant)`: adding the same pair
/// again merges into the existing line by summing quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Catalog product identifier.
    pub product_id: String,
    /// Variant label (e.g. size), if the product has variants.
    #[serde(default)]
    pub variant: Option<String>,
    /// Product name, for display and order snapshots.
    pub name: String,
    /// Unit price at the time the item was added.
    pub unit_price: Price,
    /// Quantity, always >= 1 for a line present in the cart.
    pub quantity: u32,
    /// Product image, for display.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Whether this line has the given line identity.
    fn matches(&self, product_id: &str, variant: Option<&str>) -> bool {
        self.product_id == product_id && self.variant.as_deref() == variant
    }

    /// This line's contribution to the cart total.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// Errors from cart mutations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CartError {
    /// `update_quantity` was called with a quantity below 1. Deleting a line
    /// goes through `remove_item`, never through a zero quantity.
    #[error("quantity must be at least 1; use remove to delete a line")]
    ZeroQuantity,
}

/// The persisted form of a cart.
///
/// Round-trips exactly: serializing a cart and deserializing the result
/// reproduces an equivalent cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
}

/// The shopper's cart: an ordered collection of lines, unique per
/// `(product_id, variant)`.
///
/// Derived values (`item_count`, `total_price`) are recomputed on every read
/// so they can never drift from the lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartStore {
    items: Vec<CartItem>,
}

impl CartStore {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Restore a cart from its persisted snapshot.
    ///
    /// Lines that violate the invariants (zero quantity, duplicate identity)
    /// are repaired by merging rather than rejected, so a stale or hand-edited
    /// snapshot can never wedge the shopper's cart.
    #[must_use]
    pub fn from_snapshot(snapshot: CartSnapshot) -> Self {
        let mut cart = Self::new();
        for item in snapshot.items {
            if item.quantity >= 1 {
                cart.add_item(item);
            }
        }
        cart
    }

    /// Capture the cart as its persisted form.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
        }
    }

    /// The cart lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add an item, merging into an existing line with the same
    /// `(product_id, variant)` by summing quantities.
    ///
    /// The cart never rejects on stock; stock validation is the catalog's
    /// responsibility.
    pub fn add_item(&mut self, item: CartItem) {
        if item.quantity == 0 {
            return;
        }
        match self
            .items
            .iter_mut()
            .find(|line| line.matches(&item.product_id, item.variant.as_deref()))
        {
            Some(line) => line.quantity += item.quantity,
            None => self.items.push(item),
        }
    }

    /// Remove the line with the given identity. Removing a line that is not
    /// present is a no-op, not an error.
    pub fn remove_item(&mut self, product_id: &str, variant: Option<&str>) {
        self.items
            .retain(|line| !line.matches(product_id, variant));
    }

    /// Replace the quantity of the line with the given identity.
    ///
    /// A missing line is a no-op, mirroring `remove_item`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] if `quantity < 1`; the cart never
    /// holds a zero-quantity line.
    pub fn update_quantity(
        &mut self,
        product_id: &str,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::ZeroQuantity);
        }
        if let Some(line) = self
            .items
            .iter_mut()
            .find(|line| line.matches(product_id, variant))
        {
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Empty the cart. Called exactly once, after a finalized order, never
    /// speculatively.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum over lines of `unit_price * quantity`, recomputed on every call.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(product_id: &str, variant: Option<&str>, quantity: u32, price: i64) -> CartItem {
        CartItem {
            product_id: product_id.to_owned(),
            variant: variant.map(str::to_owned),
            name: format!("Product {product_id}"),
            unit_price: Price::from_major(price),
            quantity,
            image_url: None,
        }
    }

    #[test]
    fn test_add_merges_same_line_identity() {
        let mut cart = CartStore::new();
        cart.add_item(item("P1", Some("M"), 1, 500));
        cart.add_item(item("P1", Some("M"), 2, 500));
        cart.add_item(item("P1", Some("M"), 3, 500));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items().first().unwrap().quantity, 6);
    }

    #[test]
    fn test_add_distinguishes_variants() {
        let mut cart = CartStore::new();
        cart.add_item(item("P1", Some("M"), 1, 500));
        cart.add_item(item("P1", Some("L"), 1, 500));
        cart.add_item(item("P1", None, 1, 500));

        assert_eq!(cart.items().len(), 3);
    }

    #[test]
    fn test_remove_item() {
        let mut cart = CartStore::new();
        cart.add_item(item("P1", Some("M"), 2, 500));
        cart.add_item(item("P2", None, 1, 300));

        cart.remove_item("P1", Some("M"));
        assert_eq!(cart.item_count(), 1);

        // Removing a non-existent line leaves the cart unchanged
        let before = cart.clone();
        cart.remove_item("P9", None);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = CartStore::new();
        cart.add_item(item("P1", None, 2, 500));

        cart.update_quantity("P1", None, 5).unwrap();
        assert_eq!(cart.items().first().unwrap().quantity, 5);

        assert_eq!(
            cart.update_quantity("P1", None, 0),
            Err(CartError::ZeroQuantity)
        );
        assert_eq!(cart.items().first().unwrap().quantity, 5);
    }

    #[test]
    fn test_totals_recomputed_after_every_mutation() {
        let mut cart = CartStore::new();
        cart.add_item(item("P1", Some("M"), 2, 500));
        cart.add_item(item("P2", None, 1, 300));
        assert_eq!(cart.total_price(), Price::from_major(1300));
        assert_eq!(cart.item_count(), 3);

        cart.update_quantity("P2", None, 4).unwrap();
        assert_eq!(cart.total_price(), Price::from_major(2200));

        cart.remove_item("P1", Some("M"));
        assert_eq!(cart.total_price(), Price::from_major(1200));

        cart.clear();
        assert_eq!(cart.total_price(), Price::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut cart = CartStore::new();
        cart.add_item(item("P1", Some("M"), 2, 500));
        cart.add_item(item("P1", Some("L"), 1, 500));
        cart.add_item(item("P2", None, 3, 300));

        let json = serde_json::to_string(&cart.snapshot()).unwrap();
        let restored = CartStore::from_snapshot(serde_json::from_str(&json).unwrap());

        assert_eq!(restored, cart);
        assert_eq!(restored.total_price(), cart.total_price());
    }

    #[test]
    fn test_from_snapshot_repairs_bad_lines() {
        let snapshot = CartSnapshot {
            items: vec![
                item("P1", None, 0, 500),
                item("P2", None, 1, 300),
                item("P2", None, 2, 300),
            ],
        };
        let cart = CartStore::from_snapshot(snapshot);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items().first().unwrap().quantity, 3);
    }
}
