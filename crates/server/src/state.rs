//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::shopify::{RestClient, RestError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The Admin REST client is
/// constructed once here and injected into handlers through axum state;
/// there is no process-global client lookup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    rest: RestClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Admin REST client cannot be built from the
    /// configuration.
    pub fn new(config: AppConfig) -> Result<Self, RestError> {
        let rest = RestClient::new(&config.shopify, config.request_timeout)?;
        Ok(Self::with_rest(config, rest))
    }

    /// Create an application state around an existing client.
    ///
    /// Used by tests to inject a client pointed at a fake upstream.
    #[must_use]
    pub fn with_rest(config: AppConfig, rest: RestClient) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, rest }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the Shopify Admin REST client.
    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.inner.rest
    }
}
