//! Order-confirmation notifications.
//!
//! Thin client for a transactional-email API. Confirmation sends are
//! fire-and-forget: they run on a detached task after successful
//! finalization, and a failure here never rolls back the order.

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;

use crate::config::NotifyConfig;
use crate::models::address::ShippingAddress;
use crate::models::order::{Order, OrderLineItem};

/// Errors that can occur when sending notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to build the client.
    #[error("client error: {0}")]
    Client(String),
}

/// Confirmation email payload.
#[derive(Debug, Serialize)]
struct ConfirmationPayload<'a> {
    to: &'a str,
    template: &'static str,
    order_id: i32,
    total: String,
    lines: Vec<ConfirmationLine<'a>>,
    ship_to: ShipTo<'a>,
}

#[derive(Debug, Serialize)]
struct ConfirmationLine<'a> {
    name: &'a str,
    variant: Option<&'a str>,
    quantity: u32,
    unit_price: String,
}

#[derive(Debug, Serialize)]
struct ShipTo<'a> {
    full_name: &'a str,
    address_line1: &'a str,
    address_line2: Option<&'a str>,
    city: &'a str,
    state: &'a str,
    postal_code: &'a str,
    country: &'a str,
}

/// Client for the transactional-email API.
#[derive(Clone)]
pub struct NotifyClient {
    client: reqwest::Client,
    endpoint: String,
}

impl NotifyClient {
    /// Create a new notification client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| NotifyError::Client(format!("invalid API key format: {e}")))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// Send the order-confirmation email.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it. Callers on
    /// the finalization path log and drop the error.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderLineItem],
        shipping: &ShippingAddress,
    ) -> Result<(), NotifyError> {
        let payload = ConfirmationPayload {
            to: shipping.email.as_str(),
            template: "order_confirmation",
            order_id: order.id.as_i32(),
            total: order.total.to_string(),
            lines: items
                .iter()
                .map(|item| ConfirmationLine {
                    name: &item.name,
                    variant: item.variant.as_deref(),
                    quantity: item.quantity,
                    unit_price: item.unit_price.to_string(),
                })
                .collect(),
            ship_to: ShipTo {
                full_name: &shipping.full_name,
                address_line1: &shipping.address_line1,
                address_line2: shipping.address_line2.as_deref(),
                city: &shipping.city,
                state: &shipping.state,
                postal_code: &shipping.postal_code,
                country: &shipping.country,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Spawn a detached confirmation send for a finalized order.
///
/// Failures are logged; the order is already durable and is never rolled
/// back by a notification problem.
pub fn spawn_order_confirmation(
    client: NotifyClient,
    order: Order,
    items: Vec<OrderLineItem>,
) {
    tokio::spawn(async move {
        let shipping = order.shipping.clone();
        if let Err(e) = client
            .send_order_confirmation(&order, &items, &shipping)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %e, "Order confirmation email failed");
        }
    });
}
