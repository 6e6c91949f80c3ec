//! Session-backed cart persistence.
//!
//! Every mutation persists the full cart snapshot back to the session so the
//! cart survives a page reload or browser restart. Persistence is best
//! effort: a failed write is logged and swallowed, never surfaced to the
//! shopper as a cart error. The in-memory cart remains the source of truth
//! for the request, and the next mutation re-persists the whole snapshot.

use tower_sessions::Session;

use super::{CartError, CartItem, CartSnapshot, CartStore};
use crate::models::session::keys;

/// A shopper's cart bound to their session.
pub struct SessionCart {
    session: Session,
    cart: CartStore,
}

impl SessionCart {
    /// Load the cart from the session, or start an empty one.
    ///
    /// A missing or unreadable snapshot yields an empty cart rather than an
    /// error; the snapshot is replaced wholesale on the next mutation.
    pub async fn load(session: Session) -> Self {
        let cart = match session.get::<CartSnapshot>(keys::CART).await {
            Ok(Some(snapshot)) => CartStore::from_snapshot(snapshot),
            Ok(None) => CartStore::new(),
            Err(e) => {
                tracing::warn!("Failed to load cart from session: {e}");
                CartStore::new()
            }
        };
        Self { session, cart }
    }

    /// Read access to the underlying cart.
    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// Mutable access for the finalizer, which clears the cart itself.
    pub const fn cart_mut(&mut self) -> &mut CartStore {
        &mut self.cart
    }

    /// Add an item and persist.
    pub async fn add_item(&mut self, item: CartItem) {
        self.cart.add_item(item);
        self.persist().await;
    }

    /// Remove a line and persist.
    pub async fn remove_item(&mut self, product_id: &str, variant: Option<&str>) {
        self.cart.remove_item(product_id, variant);
        self.persist().await;
    }

    /// Update a line's quantity and persist.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] if `quantity < 1`; nothing is
    /// persisted in that case.
    pub async fn update_quantity(
        &mut self,
        product_id: &str,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<(), CartError> {
        self.cart.update_quantity(product_id, variant, quantity)?;
        self.persist().await;
        Ok(())
    }

    /// Empty the cart and persist. Called after a finalized order.
    pub async fn clear(&mut self) {
        self.cart.clear();
        self.persist().await;
    }

    /// Persist the current snapshot after an out-of-band mutation through
    /// [`cart_mut`](Self::cart_mut).
    pub async fn persist(&self) {
        if let Err(e) = self.session.insert(keys::CART, self.cart.snapshot()).await {
            // Best effort: the next mutation writes the full snapshot again
            tracing::warn!("Failed to persist cart snapshot: {e}");
        }
    }
}
