//! Middleware and session plumbing.

pub mod auth;
pub mod session;

pub use auth::{clear_current_account, current_account, set_current_account};
pub use session::create_session_layer;
