//! Checkout flow: the step state machine and order finalization.
//!
//! A [`CheckoutSession`] walks the shopper from shipping capture through
//! identity resolution to confirmation. Steps and identity are tagged enums
//! with exhaustive transition handling: every state has a statically
//! enumerable set of legal next states, and an illegal transition leaves the
//! session unchanged.
//!
//! The session is transient. It lives in the session store for the duration
//! of one checkout attempt and is discarded after finalization or
//! abandonment - never persisted to durable tables.

pub mod finalize;
pub mod identity;
pub mod store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use driftwood_core::{AccountId, Email};

pub use finalize::{FinalizeError, FinalizedOrder, InFlightOrders, OrderFinalizer};
pub use identity::{IdentityResolver, Resolution};
pub use store::OrderStore;

use crate::models::address::{FieldError, ShippingAddress};

/// The checkout step the shopper is currently on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Capturing the shipping address.
    Shipping,
    /// Choosing between login and guest checkout.
    IdentityResolution,
    /// Reviewing the order; place-order is legal from here only.
    Confirmation,
}

/// Who is placing the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// Not yet resolved; the shopper has not passed identity resolution.
    Anonymous,
    /// Shopper opted out of an account; resolution is deferred to the
    /// finalizer, which creates the guest account.
    Guest {
        /// Email supplied on the guest form.
        email: Email,
    },
    /// Shopper holds an authenticated session.
    Authenticated {
        /// The logged-in account.
        account_id: AccountId,
    },
}

/// Errors from checkout transitions.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// Shipping submission failed validation; the shopper stays on the
    /// shipping step with field-level messages.
    #[error("shipping address is invalid")]
    InvalidShipping(Vec<FieldError>),

    /// The requested action is not legal from the current step. The session
    /// is left unchanged.
    #[error("{action} is not allowed at the {from:?} step")]
    IllegalTransition {
        from: CheckoutStep,
        action: &'static str,
    },

    /// Checkout requires a non-empty cart; the session is torn down and the
    /// shopper is sent back to the cart view.
    #[error("cart is empty")]
    EmptyCart,
}

/// One shopper's in-progress checkout.
///
/// The `id` doubles as the idempotency key for order creation: a retried
/// place-order for the same checkout session can never create a second
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stable for the life of the checkout attempt; order idempotency key.
    pub id: Uuid,
    step: CheckoutStep,
    shipping: Option<ShippingAddress>,
    identity: Identity,
    /// Last transition error, surfaced on the next page render.
    pub error: Option<String>,
}

impl CheckoutSession {
    /// Begin checkout at the shipping step.
    ///
    /// A shopper with an authenticated session starts with identity
    /// pre-resolved and will skip the identity-resolution step entirely.
    #[must_use]
    pub fn begin(current_account: Option<AccountId>) -> Self {
        let identity = current_account
            .map_or(Identity::Anonymous, |account_id| Identity::Authenticated {
                account_id,
            });
        Self {
            id: Uuid::new_v4(),
            step: CheckoutStep::Shipping,
            shipping: None,
            identity,
            error: None,
        }
    }

    /// The current step.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// The resolved (or deferred) identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The captured shipping address, once the shipping step has passed.
    #[must_use]
    pub const fn shipping(&self) -> Option<&ShippingAddress> {
        self.shipping.as_ref()
    }

    /// Submit the shipping address.
    ///
    /// Legal only from the shipping step. Advances to identity resolution,
    /// or straight to confirmation when identity is already authenticated
    /// (fast path).
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::IllegalTransition`] from any other step; the
    /// session is unchanged.
    pub fn submit_shipping(&mut self, address: ShippingAddress) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Shipping => {
                self.shipping = Some(address);
                self.step = match self.identity {
                    Identity::Authenticated { .. } => CheckoutStep::Confirmation,
                    Identity::Anonymous | Identity::Guest { .. } => {
                        CheckoutStep::IdentityResolution
                    }
                };
                self.error = None;
                Ok(())
            }
            from @ (CheckoutStep::IdentityResolution | CheckoutStep::Confirmation) => {
                Err(CheckoutError::IllegalTransition {
                    from,
                    action: "submit shipping",
                })
            }
        }
    }

    /// Record a successful login and advance to confirmation.
    ///
    /// A failed login never reaches this method: the shopper stays on
    /// identity resolution and may retry indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::IllegalTransition`] unless the session is at
    /// identity resolution.
    pub fn login_succeeded(&mut self, account_id: AccountId) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::IdentityResolution => {
                self.identity = Identity::Authenticated { account_id };
                self.step = CheckoutStep::Confirmation;
                self.error = None;
                Ok(())
            }
            from @ (CheckoutStep::Shipping | CheckoutStep::Confirmation) => {
                Err(CheckoutError::IllegalTransition {
                    from,
                    action: "login",
                })
            }
        }
    }

    /// Opt out of creating an account and advance to confirmation.
    ///
    /// Account resolution is deferred: the finalizer checks for an existing
    /// account and creates the guest account as part of order placement.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::IllegalTransition`] unless the session is at
    /// identity resolution.
    pub fn continue_as_guest(&mut self, email: Email) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::IdentityResolution => {
                self.identity = Identity::Guest { email };
                self.step = CheckoutStep::Confirmation;
                self.error = None;
                Ok(())
            }
            from @ (CheckoutStep::Shipping | CheckoutStep::Confirmation) => {
                Err(CheckoutError::IllegalTransition {
                    from,
                    action: "guest checkout",
                })
            }
        }
    }

    /// Send the shopper back to identity resolution after the finalizer
    /// rejected the guest email (an account already exists for it).
    ///
    /// The deferred guest identity is discarded; the shopper logs in or
    /// supplies a different email.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::IllegalTransition`] unless the session is at
    /// confirmation with a guest identity.
    pub fn identity_rejected(&mut self, message: impl Into<String>) -> Result<(), CheckoutError> {
        match (self.step, &self.identity) {
            (CheckoutStep::Confirmation, Identity::Guest { .. }) => {
                self.identity = Identity::Anonymous;
                self.step = CheckoutStep::IdentityResolution;
                self.error = Some(message.into());
                Ok(())
            }
            (from, _) => Err(CheckoutError::IllegalTransition {
                from,
                action: "identity rejection",
            }),
        }
    }
}
