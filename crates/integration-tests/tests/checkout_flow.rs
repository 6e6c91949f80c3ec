//! Integration tests for the cart-to-order pipeline.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied (task db:start)
//! - The storefront server running (cargo run -p driftwood-storefront)
//!
//! Run with: cargo test -p driftwood-integration-tests -- --ignored

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL for the storefront (configurable via environment).
fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Create a client that holds session cookies, one per simulated shopper.
fn shopper_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique email per test run so reruns never collide on the unique
/// constraint.
fn fresh_email() -> String {
    format!("shopper-{}@example.com", Uuid::new_v4().simple())
}

/// Test helper: add a line to the shopper's cart.
async fn add_to_cart(client: &Client, product_id: &str, variant: Option<&str>, quantity: u32) {
    let base_url = storefront_base_url();
    let resp = client
        .post(format!("{base_url}/cart/items"))
        .json(&json!({
            "product_id": product_id,
            "variant": variant,
            "name": format!("Product {product_id}"),
            "unit_price": "500",
            "quantity": quantity,
        }))
        .send()
        .await
        .expect("Failed to add to cart");

    assert_eq!(resp.status(), StatusCode::OK);
}

/// Test helper: walk a shopper through shipping capture.
async fn submit_shipping(client: &Client, email: &str) {
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/checkout"))
        .send()
        .await
        .expect("Failed to begin checkout");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base_url}/checkout/shipping"))
        .json(&json!({
            "full_name": "Test Shopper",
            "email": email,
            "phone": "+1 555 0100",
            "address_line1": "1 Beach Rd",
            "city": "Half Moon Bay",
            "state": "CA",
            "postal_code": "94019",
            "country": "US",
        }))
        .send()
        .await
        .expect("Failed to submit shipping");
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Cart Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_cart_merges_same_line_and_survives_reload() {
    let client = shopper_client();
    let base_url = storefront_base_url();

    add_to_cart(&client, "P1", Some("M"), 1).await;
    add_to_cart(&client, "P1", Some("M"), 2).await;

    // Same session cookie, fresh request: the cart came back from the store
    let resp = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .expect("Failed to get cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let cart: Value = resp.json().await.expect("Failed to parse cart");
    let items = cart["items"].as_array().expect("items array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 3);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_empty_cart_rejects_checkout() {
    let client = shopper_client();
    let base_url = storefront_base_url();

    let resp = client
        .post(format!("{base_url}/checkout"))
        .send()
        .await
        .expect("Failed to call checkout");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = resp.json().await.expect("Failed to parse body");
    assert_eq!(body["error_kind"], "empty_cart");
}

// ============================================================================
// Guest Checkout Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_guest_checkout_places_order_and_clears_cart() {
    let client = shopper_client();
    let base_url = storefront_base_url();
    let email = fresh_email();

    add_to_cart(&client, "P1", Some("M"), 2).await;
    submit_shipping(&client, &email).await;

    let resp = client
        .post(format!("{base_url}/checkout/guest"))
        .json(&json!({ "email": email }))
        .send()
        .await
        .expect("Failed to choose guest");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base_url}/checkout/place-order"))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Failed to parse order");
    assert_eq!(body["status"], "pending");
    assert!(body["order_id"].is_number());

    // Cart is cleared after a finalized order
    let resp = client
        .get(format!("{base_url}/cart/count"))
        .send()
        .await
        .expect("Failed to get count");
    let count: Value = resp.json().await.expect("Failed to parse count");
    assert_eq!(count["count"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_guest_with_registered_email_gets_identity_conflict() {
    let base_url = storefront_base_url();
    let email = fresh_email();

    // First shopper registers the email
    let registrant = shopper_client();
    let resp = registrant
        .post(format!("{base_url}/auth/register"))
        .json(&json!({ "email": email, "password": "g0odPassphrase!" }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::OK);

    // Second shopper tries to guest-checkout with the same email
    let guest = shopper_client();
    add_to_cart(&guest, "P2", None, 1).await;
    submit_shipping(&guest, &email).await;

    let resp = guest
        .post(format!("{base_url}/checkout/guest"))
        .json(&json!({ "email": email }))
        .send()
        .await
        .expect("Failed to choose guest");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = guest
        .post(format!("{base_url}/checkout/place-order"))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = resp.json().await.expect("Failed to parse body");
    assert_eq!(body["error_kind"], "identity_conflict");

    // The cart keeps its items for the retry after login
    let resp = guest
        .get(format!("{base_url}/cart/count"))
        .send()
        .await
        .expect("Failed to get count");
    let count: Value = resp.json().await.expect("Failed to parse count");
    assert_eq!(count["count"], 1);
}

// ============================================================================
// Authenticated Fast Path
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_registered_shopper_skips_identity_resolution() {
    let client = shopper_client();
    let base_url = storefront_base_url();
    let email = fresh_email();

    let resp = client
        .post(format!("{base_url}/auth/register"))
        .json(&json!({ "email": email, "password": "g0odPassphrase!" }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::OK);

    add_to_cart(&client, "P3", None, 1).await;
    submit_shipping(&client, &email).await;

    // Shipping submission lands straight on confirmation
    let resp = client
        .post(format!("{base_url}/checkout/place-order"))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Failed to parse order");
    assert_eq!(body["status"], "pending");
}
