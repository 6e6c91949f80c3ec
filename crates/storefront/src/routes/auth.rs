//! Authentication route handlers.
//!
//! Registration is the target of the checkout flow's signup escape: leaving
//! identity resolution for account creation ends the current checkout
//! session (the cart is untouched, so the shopper resumes checkout after).

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use driftwood_core::AccountId;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_account, set_current_account};
use crate::models::session::{CurrentAccount, keys};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Registration payload.
#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
}

/// The registered account, as reported to the UI.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
}

/// Register a new account with email and password.
///
/// Ends any in-progress checkout session; the shopper re-enters checkout
/// with identity pre-resolved.
#[instrument(skip(state, session, payload))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<AccountView>> {
    let account = AuthService::new(state.pool())
        .register_with_password(&payload.email, &payload.password)
        .await?;

    // Signup is a navigation escape out of checkout
    if let Err(e) = session
        .remove::<crate::checkout::CheckoutSession>(keys::CHECKOUT)
        .await
    {
        tracing::warn!("Failed to remove checkout session: {e}");
    }

    let current = CurrentAccount {
        id: account.id,
        email: account.email.clone(),
    };
    set_current_account(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("failed to set session account: {e}")))?;
    set_sentry_user(&account.id, Some(account.email.as_str()));

    Ok(Json(AccountView {
        id: account.id,
        email: account.email.into_inner(),
    }))
}

/// Log out the current shopper.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> StatusCode {
    clear_current_account(&session).await;
    clear_sentry_user();
    StatusCode::NO_CONTENT
}
