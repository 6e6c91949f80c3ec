//! Order finalization saga.
//!
//! Turning a confirmed checkout into a durable order takes several dependent
//! writes against the external store: resolve-or-create the identity, upsert
//! the shipping profile, create the order header, create the line items,
//! clear the cart. The writes are not atomic across steps, so the saga
//! compensates: any failure after the header exists marks the order `Failed`
//! rather than leaving a pending order with a missing line-item set.
//!
//! Two mechanisms make a retried place-order safe:
//!
//! - [`InFlightOrders`] rejects an overlapping finalize for the same checkout
//!   session (a second click while the first is pending is ignored, not
//!   queued).
//! - The checkout session's id is the order's idempotency key; the store
//!   returns the already-created order instead of inserting a second one.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::instrument;
use uuid::Uuid;

use driftwood_core::{AccountId, OrderStatus};

use super::identity::IdentityResolver;
use super::store::OrderStore;
use super::{CheckoutSession, CheckoutStep, Identity};
use crate::cart::CartStore;
use crate::db::RepositoryError;
use crate::models::order::{NewOrderLine, Order, OrderLineItem};

/// Errors from order finalization.
///
/// None of these clear the cart: the shopper can always retry or abandon.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    /// The guest email already has an account; the shopper must log in.
    /// Guest checkout never attaches to an existing account.
    #[error("an account already exists for this email, please log in")]
    IdentityConflict,

    /// Finalization was attempted with an unresolved identity.
    #[error("identity was not resolved before order placement")]
    IdentityUnresolved,

    /// The cart emptied out from under the checkout session.
    #[error("cart is empty")]
    EmptyCart,

    /// The session never captured a shipping address.
    #[error("shipping address is missing")]
    MissingShipping,

    /// Place-order is only legal from the confirmation step.
    #[error("checkout is not at the confirmation step")]
    NotAtConfirmation,

    /// Another place-order for this checkout session is still in flight.
    #[error("order placement already in progress")]
    AlreadyInFlight,

    /// A store write failed. If the order header already existed, it has
    /// been marked `Failed`.
    #[error("order store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Checkout sessions with a finalize call currently in flight.
///
/// Shared across handlers via app state. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct InFlightOrders {
    inner: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightOrders {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a checkout session as in flight.
    ///
    /// Returns `None` when a finalize for the same session is already
    /// running; the caller rejects the duplicate request. The returned guard
    /// releases the slot on drop, including on early return and panic.
    #[must_use]
    pub fn begin(&self, checkout_id: Uuid) -> Option<InFlightGuard> {
        let mut set = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if set.insert(checkout_id) {
            Some(InFlightGuard {
                inner: Arc::clone(&self.inner),
                checkout_id,
            })
        } else {
            None
        }
    }
}

/// RAII release of an in-flight slot.
pub struct InFlightGuard {
    inner: Arc<Mutex<HashSet<Uuid>>>,
    checkout_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.checkout_id);
    }
}

/// A successfully recorded order with its line items, as written.
///
/// The items ride along for the confirmation email; the order alone is what
/// the entry-point response reports.
#[derive(Debug, Clone)]
pub struct FinalizedOrder {
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// Executes the sequence of writes that durably records an order.
pub struct OrderFinalizer<'a, S> {
    store: &'a S,
    in_flight: &'a InFlightOrders,
}

impl<'a, S: OrderStore> OrderFinalizer<'a, S> {
    /// Create a finalizer over the given store and in-flight registry.
    #[must_use]
    pub const fn new(store: &'a S, in_flight: &'a InFlightOrders) -> Self {
        Self { store, in_flight }
    }

    /// Durably record the order for a confirmed checkout session.
    ///
    /// On success the cart is cleared and the pending order returned. On any
    /// failure the cart keeps its items so nothing is lost, and an
    /// already-created order header is compensated to `Failed`.
    ///
    /// # Errors
    ///
    /// See [`FinalizeError`]. Every variant is recoverable by shopper retry
    /// or abandonment.
    #[instrument(skip_all, fields(checkout_id = %checkout.id))]
    pub async fn finalize(
        &self,
        cart: &mut CartStore,
        checkout: &CheckoutSession,
    ) -> Result<FinalizedOrder, FinalizeError> {
        if checkout.step() != CheckoutStep::Confirmation {
            return Err(FinalizeError::NotAtConfirmation);
        }
        let shipping = checkout.shipping().ok_or(FinalizeError::MissingShipping)?;
        if cart.is_empty() {
            return Err(FinalizeError::EmptyCart);
        }

        // Held for the duration of the saga; a second click is rejected
        let _guard = self
            .in_flight
            .begin(checkout.id)
            .ok_or(FinalizeError::AlreadyInFlight)?;

        let account_id = self.resolve_identity(checkout.identity()).await?;

        self.store.upsert_profile(account_id, shipping).await?;

        let lines: Vec<NewOrderLine> = cart.items().iter().map(Into::into).collect();
        let total = cart.total_price();

        let mut order = self
            .store
            .create_order(account_id, shipping, total, checkout.id)
            .await?;

        let items = match self.store.create_order_line_items(order.id, &lines).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Line item creation failed, marking order failed");
                self.compensate(&order).await;
                return Err(e.into());
            }
        };

        // A retry may have reused a header compensated by an earlier attempt
        if order.status != OrderStatus::Pending {
            self.store
                .update_order_status(order.id, OrderStatus::Pending)
                .await?;
            order.status = OrderStatus::Pending;
        }

        cart.clear();
        tracing::info!(order_id = %order.id, total = %order.total, "Order finalized");

        Ok(FinalizedOrder { order, items })
    }

    /// Resolve the checkout identity to an account id, creating a guest
    /// account when the shopper opted out of registering.
    async fn resolve_identity(&self, identity: &Identity) -> Result<AccountId, FinalizeError> {
        match identity {
            Identity::Authenticated { account_id } => Ok(*account_id),
            Identity::Guest { email } => {
                // Fast-path check, as close to the insert as possible
                let resolution = IdentityResolver::new(self.store).resolve(email).await?;
                if resolution.exists {
                    return Err(FinalizeError::IdentityConflict);
                }
                match self.store.create_guest_account(email).await {
                    Ok(account) => Ok(account.id),
                    // Lost the race: the constraint is the authoritative signal
                    Err(RepositoryError::Conflict(_)) => Err(FinalizeError::IdentityConflict),
                    Err(e) => Err(e.into()),
                }
            }
            Identity::Anonymous => Err(FinalizeError::IdentityUnresolved),
        }
    }

    /// Mark a partially created order `Failed`.
    ///
    /// Best effort: a failure here is logged, and the original error is what
    /// the shopper sees.
    async fn compensate(&self, order: &Order) {
        if let Err(e) = self
            .store
            .update_order_status(order.id, OrderStatus::Failed)
            .await
        {
            tracing::error!(order_id = %order.id, error = %e, "Failed to mark partial order as failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    use chrono::Utc;
    use tokio::sync::Notify;

    use driftwood_core::{Email, OrderId, OrderItemId, Price};

    use super::*;
    use crate::cart::CartItem;
    use crate::models::account::Account;
    use crate::models::address::ShippingAddress;
    use crate::models::order::OrderLineItem;

    /// In-memory store mirroring the invariants of the Postgres store:
    /// unique email on account creation, idempotency-key dedup on orders.
    #[derive(Default)]
    struct MemoryStore {
        accounts: Mutex<Vec<Account>>,
        profiles: Mutex<Vec<(AccountId, ShippingAddress)>>,
        orders: Mutex<Vec<Order>>,
        lines: Mutex<Vec<OrderLineItem>>,
        next_id: AtomicI32,
        fail_line_items: AtomicBool,
        conflict_on_create_account: AtomicBool,
        create_order_gate: Option<Arc<Notify>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                next_id: AtomicI32::new(1),
                ..Self::default()
            }
        }

        fn with_account(self, email: &str) -> Self {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.accounts.lock().unwrap().push(Account {
                id: AccountId::new(id),
                email: Email::parse(email).unwrap(),
                guest: false,
                created_at: Utc::now(),
            });
            self
        }

        fn transient_error() -> RepositoryError {
            RepositoryError::Database(sqlx::Error::PoolTimedOut)
        }

        fn order_status(&self, order_id: OrderId) -> OrderStatus {
            self.orders
                .lock()
                .unwrap()
                .iter()
                .find(|o| o.id == order_id)
                .map(|o| o.status)
                .unwrap()
        }
    }

    impl OrderStore for MemoryStore {
        async fn find_account_by_email(
            &self,
            email: &Email,
        ) -> Result<Option<Account>, RepositoryError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.email == *email)
                .cloned())
        }

        async fn create_guest_account(&self, email: &Email) -> Result<Account, RepositoryError> {
            if self.conflict_on_create_account.load(Ordering::SeqCst) {
                return Err(RepositoryError::Conflict(
                    "email already has an account".to_owned(),
                ));
            }
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.iter().any(|a| a.email == *email) {
                return Err(RepositoryError::Conflict(
                    "email already has an account".to_owned(),
                ));
            }
            let account = Account {
                id: AccountId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
                email: email.clone(),
                guest: true,
                created_at: Utc::now(),
            };
            accounts.push(account.clone());
            Ok(account)
        }

        async fn upsert_profile(
            &self,
            account_id: AccountId,
            address: &ShippingAddress,
        ) -> Result<(), RepositoryError> {
            let mut profiles = self.profiles.lock().unwrap();
            profiles.retain(|(id, _)| *id != account_id);
            profiles.push((account_id, address.clone()));
            Ok(())
        }

        async fn create_order(
            &self,
            account_id: AccountId,
            shipping: &ShippingAddress,
            total: Price,
            idempotency_key: Uuid,
        ) -> Result<Order, RepositoryError> {
            if let Some(gate) = &self.create_order_gate {
                gate.notified().await;
            }
            let mut orders = self.orders.lock().unwrap();
            if let Some(existing) = orders
                .iter()
                .find(|o| o.idempotency_key == idempotency_key)
            {
                return Ok(existing.clone());
            }
            let order = Order {
                id: OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
                account_id,
                status: OrderStatus::Pending,
                shipping: shipping.clone(),
                total,
                idempotency_key,
                created_at: Utc::now(),
            };
            orders.push(order.clone());
            Ok(order)
        }

        async fn create_order_line_items(
            &self,
            order_id: OrderId,
            lines: &[NewOrderLine],
        ) -> Result<Vec<OrderLineItem>, RepositoryError> {
            if self.fail_line_items.load(Ordering::SeqCst) {
                return Err(Self::transient_error());
            }
            let mut stored = self.lines.lock().unwrap();
            let mut created = Vec::with_capacity(lines.len());
            for line in lines {
                let item = OrderLineItem {
                    id: OrderItemId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
                    order_id,
                    product_id: line.product_id.clone(),
                    variant: line.variant.clone(),
                    name: line.name.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                };
                stored.push(item.clone());
                created.push(item);
            }
            Ok(created)
        }

        async fn update_order_status(
            &self,
            order_id: OrderId,
            status: OrderStatus,
        ) -> Result<(), RepositoryError> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or(RepositoryError::NotFound)?;
            order.status = status;
            Ok(())
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Alex Shore".to_owned(),
            email: Email::parse("alex@example.com").unwrap(),
            phone: "+1 555 0100".to_owned(),
            address_line1: "1 Beach Rd".to_owned(),
            address_line2: None,
            city: "Half Moon Bay".to_owned(),
            state: "CA".to_owned(),
            postal_code: "94019".to_owned(),
            country: "US".to_owned(),
        }
    }

    fn sample_cart() -> CartStore {
        let mut cart = CartStore::new();
        cart.add_item(CartItem {
            product_id: "P1".to_owned(),
            variant: Some("M".to_owned()),
            name: "Linen Shirt".to_owned(),
            unit_price: Price::from_major(500),
            quantity: 2,
            image_url: None,
        });
        cart.add_item(CartItem {
            product_id: "P2".to_owned(),
            variant: None,
            name: "Canvas Tote".to_owned(),
            unit_price: Price::from_major(300),
            quantity: 1,
            image_url: None,
        });
        cart
    }

    fn guest_checkout(email: &str) -> CheckoutSession {
        let mut session = CheckoutSession::begin(None);
        session.submit_shipping(address()).unwrap();
        session
            .continue_as_guest(Email::parse(email).unwrap())
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_guest_finalize_creates_account_order_and_lines() {
        let store = MemoryStore::new();
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let mut cart = sample_cart();
        assert_eq!(cart.total_price(), Price::from_major(1300));

        let checkout = guest_checkout("fresh@example.com");
        let finalized = finalizer.finalize(&mut cart, &checkout).await.unwrap();

        assert_eq!(finalized.order.status, OrderStatus::Pending);
        assert_eq!(finalized.order.total, Price::from_major(1300));
        assert_eq!(finalized.items.len(), 2);
        assert_eq!(store.accounts.lock().unwrap().len(), 1);
        assert!(store.accounts.lock().unwrap().first().unwrap().guest);
        assert_eq!(store.orders.lock().unwrap().len(), 1);
        assert_eq!(store.lines.lock().unwrap().len(), 2);
        assert_eq!(store.profiles.lock().unwrap().len(), 1);
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_guest_with_existing_email_conflicts_before_any_write() {
        let store = MemoryStore::new().with_account("taken@example.com");
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let mut cart = sample_cart();
        let checkout = guest_checkout("taken@example.com");
        let result = finalizer.finalize(&mut cart, &checkout).await;

        assert!(matches!(result, Err(FinalizeError::IdentityConflict)));
        // No second account, no order, cart untouched
        assert_eq!(store.accounts.lock().unwrap().len(), 1);
        assert!(store.orders.lock().unwrap().is_empty());
        assert_eq!(cart.item_count(), 3);
    }

    #[tokio::test]
    async fn test_lost_creation_race_maps_conflict_to_identity_conflict() {
        let store = MemoryStore::new();
        store.conflict_on_create_account.store(true, Ordering::SeqCst);
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let mut cart = sample_cart();
        let checkout = guest_checkout("racer@example.com");
        let result = finalizer.finalize(&mut cart, &checkout).await;

        assert!(matches!(result, Err(FinalizeError::IdentityConflict)));
        assert!(store.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_line_item_failure_marks_order_failed_and_keeps_cart() {
        let store = MemoryStore::new();
        store.fail_line_items.store(true, Ordering::SeqCst);
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let mut cart = sample_cart();
        let checkout = guest_checkout("fresh@example.com");
        let result = finalizer.finalize(&mut cart, &checkout).await;

        assert!(matches!(result, Err(FinalizeError::Store(_))));

        let order_id = store.orders.lock().unwrap().first().unwrap().id;
        assert_eq!(store.order_status(order_id), OrderStatus::Failed);
        assert!(store.lines.lock().unwrap().is_empty());
        // Cart retains its items for shopper retry
        assert_eq!(cart.item_count(), 3);
    }

    #[tokio::test]
    async fn test_place_order_before_confirmation_is_rejected() {
        let store = MemoryStore::new();
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let mut session = CheckoutSession::begin(None);
        session.submit_shipping(address()).unwrap();
        // Still at IdentityResolution: place-order is not legal yet
        let mut cart = sample_cart();
        let result = finalizer.finalize(&mut cart, &session).await;
        assert!(matches!(result, Err(FinalizeError::NotAtConfirmation)));
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let store = MemoryStore::new();
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let mut cart = CartStore::new();
        let checkout = guest_checkout("fresh@example.com");
        let result = finalizer.finalize(&mut cart, &checkout).await;
        assert!(matches!(result, Err(FinalizeError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_retry_with_same_checkout_reuses_order() {
        let store = MemoryStore::new();
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let checkout = guest_checkout("fresh@example.com");

        // First attempt fails at line items; order header exists, marked failed
        store.fail_line_items.store(true, Ordering::SeqCst);
        let mut cart = sample_cart();
        let _ = finalizer.finalize(&mut cart, &checkout).await.unwrap_err();

        // Retry of the same shopper action succeeds against the same header
        store.fail_line_items.store(false, Ordering::SeqCst);
        let finalized = finalizer.finalize(&mut cart, &checkout).await.unwrap();

        assert_eq!(store.orders.lock().unwrap().len(), 1);
        assert_eq!(finalized.order.idempotency_key, checkout.id);
        // The compensated header is reactivated on the successful retry
        assert_eq!(finalized.order.status, OrderStatus::Pending);
        assert_eq!(store.order_status(finalized.order.id), OrderStatus::Pending);
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_finalize_yields_at_most_one_order() {
        let gate = Arc::new(Notify::new());
        let store = MemoryStore {
            next_id: AtomicI32::new(1),
            create_order_gate: Some(Arc::clone(&gate)),
            ..MemoryStore::default()
        };
        let in_flight = InFlightOrders::new();
        let finalizer = OrderFinalizer::new(&store, &in_flight);

        let checkout = guest_checkout("fresh@example.com");
        let mut cart_a = sample_cart();
        let mut cart_b = sample_cart();

        // First call parks inside create_order; the overlapping second click
        // must be rejected, then the first completes once the gate opens.
        let first = finalizer.finalize(&mut cart_a, &checkout);
        let second = async {
            tokio::task::yield_now().await;
            let result = finalizer.finalize(&mut cart_b, &checkout).await;
            gate.notify_one();
            result
        };

        let (first_result, second_result) = tokio::join!(first, second);

        assert!(first_result.is_ok());
        assert!(matches!(
            second_result,
            Err(FinalizeError::AlreadyInFlight)
        ));
        assert_eq!(store.orders.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let in_flight = InFlightOrders::new();
        let id = Uuid::new_v4();

        let guard = in_flight.begin(id).unwrap();
        assert!(in_flight.begin(id).is_none());
        drop(guard);
        assert!(in_flight.begin(id).is_some());
    }
}
