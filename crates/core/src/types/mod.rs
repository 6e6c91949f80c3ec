//! Domain types shared across Driftwood crates.

mod email;
mod id;
mod price;
mod status;

pub use email::{Email, EmailError};
pub use price::Price;
pub use status::OrderStatus;

// `define_id!` lives at the crate root via #[macro_export]; the generated
// ID types are defined in `id` and re-exported here.
pub use id::{AccountId, OrderId, OrderItemId};
