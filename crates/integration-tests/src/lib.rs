//! Integration tests for Driftwood.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! task db:start
//!
//! # Run the storefront, then the integration suite
//! cargo run -p driftwood-storefront &
//! cargo test -p driftwood-integration-tests -- --ignored
//! ```
//!
//! Tests drive the running storefront over HTTP with a cookie-holding
//! client, one client per simulated shopper.
