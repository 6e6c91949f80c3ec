//! Storefront services.
//!
//! - [`auth`] - Password authentication (the Authentication Provider)
//! - [`notify`] - Order-confirmation notifications (fire-and-forget)

pub mod auth;
pub mod notify;
