//! Order repository and the `PostgreSQL`-backed order store.
//!
//! Order creation is deduplicated on the checkout session's idempotency key:
//! retrying a finalize call that already created its header returns the
//! existing row instead of inserting a second order.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use driftwood_core::{AccountId, Email, OrderId, OrderItemId, OrderStatus, Price};

use super::{AccountRepository, RepositoryError};
use crate::checkout::store::OrderStore;
use crate::models::account::Account;
use crate::models::address::ShippingAddress;
use crate::models::order::{NewOrderLine, Order, OrderLineItem};

/// Row shape for order header queries.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    account_id: i32,
    status: OrderStatus,
    full_name: String,
    email: String,
    phone: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    total: Price,
    idempotency_key: Uuid,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Order {
            id: OrderId::new(self.id),
            account_id: AccountId::new(self.account_id),
            status: self.status,
            shipping: ShippingAddress {
                full_name: self.full_name,
                email,
                phone: self.phone,
                address_line1: self.address_line1,
                address_line2: self.address_line2,
                city: self.city,
                state: self.state,
                postal_code: self.postal_code,
                country: self.country,
            },
            total: self.total,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = r"id, account_id, status, full_name, email, phone,
    address_line1, address_line2, city, state, postal_code, country,
    total, idempotency_key, created_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an order header with `status = pending`, snapshotting the
    /// shipping address and total.
    ///
    /// If an order with this idempotency key already exists, the existing
    /// order is returned and nothing is inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    /// Returns `RepositoryError::DataCorruption` if stored data is invalid.
    pub async fn create(
        &self,
        account_id: AccountId,
        shipping: &ShippingAddress,
        total: Price,
        idempotency_key: Uuid,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO storefront.order
                (account_id, status, full_name, email, phone, address_line1,
                 address_line2, city, state, postal_code, country, total,
                 idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(account_id.as_i32())
            .bind(OrderStatus::Pending)
            .bind(&shipping.full_name)
            .bind(shipping.email.as_str())
            .bind(&shipping.phone)
            .bind(&shipping.address_line1)
            .bind(&shipping.address_line2)
            .bind(&shipping.city)
            .bind(&shipping.state)
            .bind(&shipping.postal_code)
            .bind(&shipping.country)
            .bind(total)
            .bind(idempotency_key)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => row.into_order(),
            // Conflicting key: this shopper action already created its order
            None => self
                .get_by_idempotency_key(idempotency_key)
                .await?
                .ok_or(RepositoryError::NotFound),
        }
    }

    /// Look up an order by its idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_idempotency_key(
        &self,
        idempotency_key: Uuid,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE idempotency_key = $1
            "
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(idempotency_key)
            .fetch_optional(self.pool)
            .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Create one line item per cart line, snapshotting name/price/quantity.
    ///
    /// All lines are written in a single transaction so a failed insert never
    /// leaves a partial line-item set behind.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails.
    pub async fn create_line_items(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLineItem>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct LineRow {
            id: i32,
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(lines.len());

        for line in lines {
            let row = sqlx::query_as::<_, LineRow>(
                r"
                INSERT INTO storefront.order_line_item
                    (order_id, product_id, variant, name, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                ",
            )
            .bind(order_id.as_i32())
            .bind(&line.product_id)
            .bind(&line.variant)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(i64::from(line.quantity))
            .fetch_one(&mut *tx)
            .await?;

            created.push(OrderLineItem {
                id: OrderItemId::new(row.id),
                order_id,
                product_id: line.product_id.clone(),
                variant: line.variant.clone(),
                name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }

        tx.commit().await?;

        Ok(created)
    }

    /// Update an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET status = $1
            WHERE id = $2
            ",
        )
        .bind(status)
        .bind(order_id.as_i32())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

/// `PostgreSQL`-backed [`OrderStore`], adapting the repositories to the
/// collaborator contract the finalizer consumes.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for PgOrderStore {
    async fn find_account_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<Account>, RepositoryError> {
        AccountRepository::new(&self.pool).find_by_email(email).await
    }

    async fn create_guest_account(&self, email: &Email) -> Result<Account, RepositoryError> {
        AccountRepository::new(&self.pool).create_guest(email).await
    }

    async fn upsert_profile(
        &self,
        account_id: AccountId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError> {
        AccountRepository::new(&self.pool)
            .upsert_profile(account_id, address)
            .await
    }

    async fn create_order(
        &self,
        account_id: AccountId,
        shipping: &ShippingAddress,
        total: Price,
        idempotency_key: Uuid,
    ) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool)
            .create(account_id, shipping, total, idempotency_key)
            .await
    }

    async fn create_order_line_items(
        &self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLineItem>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .create_line_items(order_id, lines)
            .await
    }

    async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        OrderRepository::new(&self.pool)
            .update_status(order_id, status)
            .await
    }
}
