//! Status enums for orders.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// Every order is created `Pending`. The finalization saga marks an order
/// `Failed` when a later step of order creation does not complete, so a
/// partially written order is never left looking like a live one. The
/// remaining states are advanced by downstream fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
pub enum OrderStatus {
    /// Created, awaiting payment/fulfillment.
    #[default]
    Pending,
    /// Order creation did not complete; compensated by the finalizer.
    Failed,
    /// Payment captured.
    Paid,
    /// Shipped to the shopper.
    Fulfilled,
    /// Cancelled before fulfillment.
    Cancelled,
}

impl OrderStatus {
    /// The wire/database representation of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Paid => "paid",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
        let parsed: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, OrderStatus::Pending);
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderStatus::Fulfilled.to_string(), "fulfilled");
    }
}
