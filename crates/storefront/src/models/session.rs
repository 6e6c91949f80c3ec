//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state. The
//! cart snapshot and the checkout session are transient: they live only in
//! the session store, never in durable tables.

use serde::{Deserialize, Serialize};

use driftwood_core::{AccountId, Email};

/// Session-stored account identity.
///
/// Minimal data stored in the session to identify the logged-in shopper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentAccount {
    /// Account's database ID.
    pub id: AccountId,
    /// Account's email address.
    pub email: Email,
}

/// Session keys for shopper state.
pub mod keys {
    /// Key for storing the current logged-in account.
    pub const CURRENT_ACCOUNT: &str = "current_account";

    /// Key for the persisted cart snapshot.
    pub const CART: &str = "cart";

    /// Key for the in-progress checkout session.
    pub const CHECKOUT: &str = "checkout";
}
