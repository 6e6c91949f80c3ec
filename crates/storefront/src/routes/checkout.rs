//! Checkout route handlers.
//!
//! These handlers drive the [`CheckoutSession`] state machine stored in the
//! shopper's session. The cart must stay non-empty for checkout to proceed:
//! any handler that finds an empty cart tears the checkout session down and
//! reports `empty_cart`, which the UI treats as a redirect back to the cart
//! view.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use driftwood_core::Email;

use crate::cart::session::SessionCart;
use crate::checkout::{
    CheckoutError, CheckoutSession, CheckoutStep, FinalizeError, Identity, OrderFinalizer,
};
use crate::error::{AppError, Result};
use crate::middleware::current_account;
use crate::models::address::ShippingAddressInput;
use crate::models::session::keys;
use crate::services::notify::spawn_order_confirmation;
use crate::state::AppState;

/// Checkout state reported to the UI after every transition.
#[derive(Debug, Serialize)]
pub struct CheckoutView {
    pub step: CheckoutStep,
    pub identity: &'static str,
    pub error: Option<String>,
}

impl From<&CheckoutSession> for CheckoutView {
    fn from(session: &CheckoutSession) -> Self {
        Self {
            step: session.step(),
            identity: match session.identity() {
                Identity::Anonymous => "anonymous",
                Identity::Guest { .. } => "guest",
                Identity::Authenticated { .. } => "authenticated",
            },
            error: session.error.clone(),
        }
    }
}

/// Login payload for the identity-resolution step.
#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// Guest opt-out payload.
#[derive(Debug, Deserialize)]
pub struct GuestPayload {
    pub email: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the in-progress checkout session, if any.
async fn load_checkout(session: &Session) -> Option<CheckoutSession> {
    session
        .get::<CheckoutSession>(keys::CHECKOUT)
        .await
        .ok()
        .flatten()
}

/// Persist the checkout session.
async fn save_checkout(session: &Session, checkout: &CheckoutSession) -> Result<()> {
    session
        .insert(keys::CHECKOUT, checkout)
        .await
        .map_err(|e| AppError::Internal(format!("failed to save checkout session: {e}")))
}

/// Discard the checkout session (finalization or abandonment).
async fn teardown_checkout(session: &Session) {
    if let Err(e) = session.remove::<CheckoutSession>(keys::CHECKOUT).await {
        tracing::warn!("Failed to remove checkout session: {e}");
    }
}

/// Enforce the non-empty-cart guard; tears the checkout session down when
/// the cart has emptied out from under it.
async fn require_non_empty_cart(session: &Session, cart: &SessionCart) -> Result<()> {
    if cart.cart().is_empty() {
        teardown_checkout(session).await;
        return Err(AppError::Checkout(CheckoutError::EmptyCart));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Begin checkout at the shipping step.
///
/// A shopper with an authenticated session starts with identity pre-resolved
/// and will skip identity resolution entirely.
#[instrument(skip(session))]
pub async fn begin(session: Session) -> Result<Json<CheckoutView>> {
    let cart = SessionCart::load(session.clone()).await;
    if cart.cart().is_empty() {
        return Err(AppError::Checkout(CheckoutError::EmptyCart));
    }

    let account_id = current_account(&session).await.map(|a| a.id);
    let checkout = CheckoutSession::begin(account_id);
    save_checkout(&session, &checkout).await?;

    Ok(Json(CheckoutView::from(&checkout)))
}

/// Submit the shipping address.
#[instrument(skip(session, input))]
pub async fn shipping(
    session: Session,
    Json(input): Json<ShippingAddressInput>,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session)
        .await
        .ok_or_else(|| AppError::BadRequest("no checkout in progress".into()))?;

    let cart = SessionCart::load(session.clone()).await;
    require_non_empty_cart(&session, &cart).await?;

    let address = input
        .validate()
        .map_err(|fields| AppError::Checkout(CheckoutError::InvalidShipping(fields)))?;

    checkout.submit_shipping(address)?;
    save_checkout(&session, &checkout).await?;

    Ok(Json(CheckoutView::from(&checkout)))
}

/// Log in during identity resolution.
///
/// On failure the checkout session is untouched: the shopper stays at
/// identity resolution and may retry indefinitely.
#[instrument(skip(state, session, payload))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session)
        .await
        .ok_or_else(|| AppError::BadRequest("no checkout in progress".into()))?;

    let cart = SessionCart::load(session.clone()).await;
    require_non_empty_cart(&session, &cart).await?;

    let account = crate::services::auth::AuthService::new(state.pool())
        .login_with_password(&payload.email, &payload.password)
        .await?;

    checkout.login_succeeded(account.id)?;
    save_checkout(&session, &checkout).await?;

    let current = crate::models::session::CurrentAccount {
        id: account.id,
        email: account.email.clone(),
    };
    if let Err(e) = crate::middleware::set_current_account(&session, &current).await {
        tracing::error!("Failed to set session account: {e}");
    }
    crate::error::set_sentry_user(&account.id, Some(account.email.as_str()));

    Ok(Json(CheckoutView::from(&checkout)))
}

/// Continue as guest: opt out of creating an account.
///
/// Account resolution is deferred to the finalizer, which checks for an
/// existing account immediately before creating the guest account.
#[instrument(skip(session, payload))]
pub async fn guest(session: Session, Json(payload): Json<GuestPayload>) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session)
        .await
        .ok_or_else(|| AppError::BadRequest("no checkout in progress".into()))?;

    let cart = SessionCart::load(session.clone()).await;
    require_non_empty_cart(&session, &cart).await?;

    let email = Email::parse(&payload.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;

    checkout.continue_as_guest(email)?;
    save_checkout(&session, &checkout).await?;

    Ok(Json(CheckoutView::from(&checkout)))
}

/// Place the order: run the finalization saga.
///
/// On success the checkout session is discarded, the cleared cart snapshot
/// is persisted, and the confirmation email is dispatched fire-and-forget.
/// On failure the session stays at confirmation (or returns to identity
/// resolution on an identity conflict) and the cart keeps its items.
#[instrument(skip(state, session))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>> {
    let checkout = load_checkout(&session)
        .await
        .ok_or_else(|| AppError::BadRequest("no checkout in progress".into()))?;

    let mut cart = SessionCart::load(session.clone()).await;
    require_non_empty_cart(&session, &cart).await?;

    let finalizer = OrderFinalizer::new(state.order_store(), state.in_flight());
    match finalizer.finalize(cart.cart_mut(), &checkout).await {
        Ok(finalized) => {
            // Cart was cleared by the finalizer; persist the empty snapshot
            cart.persist().await;
            teardown_checkout(&session).await;

            if let Some(notifier) = state.notifier() {
                spawn_order_confirmation(
                    notifier.clone(),
                    finalized.order.clone(),
                    finalized.items,
                );
            }

            Ok(Json(json!({
                "order_id": finalized.order.id,
                "status": finalized.order.status,
            })))
        }
        Err(FinalizeError::IdentityConflict) => {
            // Send the shopper back to identity resolution with the error
            let mut checkout = checkout;
            if checkout
                .identity_rejected("An account with this email already exists, please log in")
                .is_ok()
            {
                save_checkout(&session, &checkout).await?;
            }
            Err(AppError::Finalize(FinalizeError::IdentityConflict))
        }
        Err(e) => Err(e.into()),
    }
}
