//! Guest-checkout identity resolution.
//!
//! Used only on the guest path, immediately before account creation, to keep
//! the window between check and insert as small as possible. The pre-check is
//! a UX fast path; the store's unique constraint remains the authoritative
//! guard against duplicate accounts.

use driftwood_core::{AccountId, Email};

use super::store::OrderStore;
use crate::db::RepositoryError;

/// Outcome of an email lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Whether an account already exists for the email.
    pub exists: bool,
    /// The existing account's ID, when one exists.
    pub account_id: Option<AccountId>,
}

/// Resolves whether an email already has an account.
pub struct IdentityResolver<'a, S> {
    store: &'a S,
}

impl<'a, S: OrderStore> IdentityResolver<'a, S> {
    /// Create a resolver over the given store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Look up an existing account by exact email match.
    ///
    /// Guest checkout never attaches to an existing account: when
    /// `exists` is true the caller aborts with an identity conflict and the
    /// shopper is sent to login instead.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the lookup fails.
    pub async fn resolve(&self, email: &Email) -> Result<Resolution, RepositoryError> {
        let account = self.store.find_account_by_email(email).await?;
        Ok(Resolution {
            exists: account.is_some(),
            account_id: account.map(|a| a.id),
        })
    }
}
