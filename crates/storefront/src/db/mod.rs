//! Database operations for the storefront `PostgreSQL`.
//!
//! # Database: `driftwood_storefront`
//!
//! ## Tables
//!
//! - `account` - Shopper accounts (registered and guest; email unique)
//! - `account_password` - Password hashes for registered accounts
//! - `shipping_profile` - One reusable shipping/contact profile per account
//! - `order` - Order headers (address + total snapshots, idempotency key)
//! - `order_line_item` - Per-line name/price snapshots
//! - `session` - Tower-sessions storage (cart snapshots, checkout sessions)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and applied with
//! `sqlx migrate run` by the deployment tooling; they are NOT run on startup.

pub mod accounts;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use accounts::AccountRepository;
pub use orders::{OrderRepository, PgOrderStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a sqlx error, turning a unique-constraint violation into
    /// [`Conflict`](Self::Conflict).
    ///
    /// The unique constraint is the authoritative guard for invariants like
    /// one-account-per-email; callers treat `Conflict` as the signal, not as
    /// an internal failure.
    pub(crate) fn from_sqlx(e: sqlx::Error, conflict_message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict_message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
