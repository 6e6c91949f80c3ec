//! External order store contract.
//!
//! The finalizer consumes durable persistence through this trait so the saga
//! can be exercised against an in-memory store in tests and against
//! [`PgOrderStore`](crate::db::PgOrderStore) in production.

use uuid::Uuid;

use driftwood_core::{AccountId, Email, OrderId, OrderStatus, Price};

use crate::db::RepositoryError;
use crate::models::account::Account;
use crate::models::address::ShippingAddress;
use crate::models::order::{NewOrderLine, Order, OrderLineItem};

/// Durable persistence for accounts, profiles, orders, and order lines.
///
/// Implementations must uphold two invariants the finalizer relies on:
///
/// - `create_guest_account` fails with [`RepositoryError::Conflict`] when the
///   email already has an account (unique constraint, not a pre-check).
/// - `create_order` deduplicates on `idempotency_key`: a repeated call with
///   the same key returns the previously created order.
#[allow(async_fn_in_trait)]
pub trait OrderStore {
    /// Look up an account by exact email match.
    async fn find_account_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Account>, RepositoryError>;

    /// Create a guest account for an email with no existing account.
    async fn create_guest_account(&self, email: &Email) -> Result<Account, RepositoryError>;

    /// Persist or overwrite the account's shipping/contact profile.
    async fn upsert_profile(
        &self,
        account_id: AccountId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError>;

    /// Create a pending order header, snapshotting address and total.
    async fn create_order(
        &self,
        account_id: AccountId,
        shipping: &ShippingAddress,
        total: Price,
        idempotency_key: Uuid,
    ) -> Result<Order, RepositoryError>;

    /// Create one line item per cart line.
    async fn create_order_line_items(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLineItem>, RepositoryError>;

    /// Update an order's status.
    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError>;
}
