//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database row
//! types and from the raw form/JSON inputs the routes accept.

pub mod account;
pub mod address;
pub mod order;
pub mod session;

pub use account::Account;
pub use address::{FieldError, ShippingAddress, ShippingAddressInput};
pub use order::{NewOrderLine, Order, OrderLineItem};
pub use session::CurrentAccount;
