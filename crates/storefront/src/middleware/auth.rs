//! Session helpers for the authenticated shopper.

use tower_sessions::Session;

use crate::models::session::{CurrentAccount, keys};

/// Get the current logged-in account from the session, if any.
pub async fn current_account(session: &Session) -> Option<CurrentAccount> {
    session
        .get::<CurrentAccount>(keys::CURRENT_ACCOUNT)
        .await
        .ok()
        .flatten()
}

/// Store the logged-in account in the session.
///
/// # Errors
///
/// Returns the session store error if the write fails.
pub async fn set_current_account(
    session: &Session,
    account: &CurrentAccount,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_ACCOUNT, account).await
}

/// Remove the logged-in account from the session.
pub async fn clear_current_account(session: &Session) {
    if let Err(e) = session.remove::<CurrentAccount>(keys::CURRENT_ACCOUNT).await {
        tracing::warn!("Failed to clear current account from session: {e}");
    }
}
