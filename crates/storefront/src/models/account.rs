//! Account domain types.

use chrono::{DateTime, Utc};

use driftwood_core::{AccountId, Email};

/// A storefront account (domain type).
///
/// Guest accounts are created on the fly during guest checkout; registered
/// accounts additionally carry a password hash row. The store enforces at
/// most one account per email via a unique constraint.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique account ID.
    pub id: AccountId,
    /// Account email address (normalized, unique).
    pub email: Email,
    /// Whether this account was created during guest checkout.
    pub guest: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
