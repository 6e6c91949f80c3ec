//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::checkout::InFlightOrders;
use crate::config::StorefrontConfig;
use crate::db::PgOrderStore;
use crate::services::notify::NotifyClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    order_store: PgOrderStore,
    notifier: Option<NotifyClient>,
    in_flight: InFlightOrders,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the notification client cannot be built from the
    /// configuration.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
    ) -> Result<Self, crate::services::notify::NotifyError> {
        let notifier = config
            .notify
            .as_ref()
            .map(NotifyClient::new)
            .transpose()?;
        let order_store = PgOrderStore::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                order_store,
                notifier,
                in_flight: InFlightOrders::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the durable order store.
    #[must_use]
    pub fn order_store(&self) -> &PgOrderStore {
        &self.inner.order_store
    }

    /// Get the notification client, if confirmations are configured.
    #[must_use]
    pub fn notifier(&self) -> Option<&NotifyClient> {
        self.inner.notifier.as_ref()
    }

    /// Get the in-flight finalization registry.
    #[must_use]
    pub fn in_flight(&self) -> &InFlightOrders {
        &self.inner.in_flight
    }
}
