//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ADMIN_TOKEN` - Admin API access token for the store
//!
//! ## Optional
//! - `SHELFTAG_HOST` - Bind address (default: 127.0.0.1)
//! - `SHELFTAG_PORT` - Listen port (default: 3000, falls back through
//!   `BACKEND_PORT` then `PORT` for platform-provided values)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `SHELFTAG_PAGE_SIZE` - Products fetched per page (default: 50)
//! - `SHELFTAG_MAX_IN_FLIGHT` - Concurrent metafield writes (default: 4)
//! - `SHELFTAG_PAGE_CEILING` - Circuit-breaker page limit (default: none)
//! - `SHELFTAG_REQUEST_TIMEOUT_SECS` - Per-call upstream timeout (default: 30)
//! - `SHELFTAG_METAFIELD_NAMESPACE` - Metafield namespace (default: custom)
//! - `SHELFTAG_METAFIELD_KEY` - Metafield key (default: demo_counter)
//! - `SHELFTAG_METAFIELD_VALUE` - Metafield value (default: 1)
//! - `SHELFTAG_METAFIELD_TYPE` - Metafield type (default: number_integer)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::shopify::metafields::MetafieldSpec;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Shopify Admin API configuration
    pub shopify: ShopifyAdminConfig,
    /// Products fetched per collection page
    pub page_size: u32,
    /// Maximum concurrent metafield writes
    pub max_in_flight: usize,
    /// Circuit-breaker page limit for the walk (None = no ceiling)
    pub page_ceiling: Option<NonZeroU32>,
    /// Per-call timeout for upstream requests
    pub request_timeout: Duration,
    /// Metafield written by the annotate endpoint
    pub metafield: MetafieldSpec,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Shopify Admin REST API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopifyAdminConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2026-01)
    pub api_version: String,
    /// Admin API access token (server-side only)
    pub admin_token: SecretString,
}

impl std::fmt::Debug for ShopifyAdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAdminConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("admin_token", &"[REDACTED]")
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("SHELFTAG_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHELFTAG_HOST".to_string(), e.to_string()))?;
        let port = get_port()?;

        let shopify = ShopifyAdminConfig::from_env()?;

        let page_size = get_positive_u32("SHELFTAG_PAGE_SIZE", 50)?;
        let max_in_flight = get_positive_u32("SHELFTAG_MAX_IN_FLIGHT", 4)? as usize;
        let page_ceiling = get_optional_env("SHELFTAG_PAGE_CEILING")
            .map(|v| {
                v.parse::<NonZeroU32>().map_err(|e| {
                    ConfigError::InvalidEnvVar("SHELFTAG_PAGE_CEILING".to_string(), e.to_string())
                })
            })
            .transpose()?;
        let timeout_secs = get_positive_u32("SHELFTAG_REQUEST_TIMEOUT_SECS", 30)?;

        let metafield = MetafieldSpec {
            namespace: get_env_or_default("SHELFTAG_METAFIELD_NAMESPACE", "custom"),
            key: get_env_or_default("SHELFTAG_METAFIELD_KEY", "demo_counter"),
            value: get_env_or_default("SHELFTAG_METAFIELD_VALUE", "1"),
            value_type: get_env_or_default("SHELFTAG_METAFIELD_TYPE", "number_integer"),
        };

        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            shopify,
            page_size,
            max_in_flight,
            page_ceiling,
            request_timeout: Duration::from_secs(u64::from(timeout_secs)),
            metafield,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShopifyAdminConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: get_required_env("SHOPIFY_STORE")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
            admin_token: SecretString::from(get_required_env("SHOPIFY_ADMIN_TOKEN")?),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get the listen port, falling back through platform-provided variables.
fn get_port() -> Result<u16, ConfigError> {
    let (key, raw) = ["SHELFTAG_PORT", "BACKEND_PORT", "PORT"]
        .iter()
        .find_map(|key| std::env::var(key).ok().map(|v| (*key, v)))
        .unwrap_or(("SHELFTAG_PORT", "3000".to_string()));

    raw.parse::<u16>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a positive integer with a default, rejecting zero.
fn get_positive_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?,
        Err(_) => default,
    };
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be a positive integer".to_string(),
        ));
    }
    Ok(value)
}
