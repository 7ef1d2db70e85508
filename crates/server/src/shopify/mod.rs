//! Shopify Admin REST API client and the collection walk-and-tag core.
//!
//! # Architecture
//!
//! - [`rest`] - authenticated REST client and the [`AdminApi`] collaborator
//!   seam the rest of the crate is written against
//! - [`pagination`] - cursor-driven page walk over a paginated collection
//! - [`metafields`] - bounded-concurrency metafield writes with per-item
//!   outcomes
//!
//! # Example
//!
//! ```rust,ignore
//! use shelftag_server::shopify::{metafields::BatchAnnotator, pagination::PageWalker};
//!
//! let products = PageWalker::new("collections/42/products.json".into(), 50)
//!     .collect_all(&client)
//!     .await?;
//! let report = BatchAnnotator::new(spec, 4).annotate_all(&client, &products).await;
//! ```

pub mod metafields;
pub mod pagination;
pub mod rest;

pub use rest::{AdminApi, RestClient, RestResponse};

use thiserror::Error;

/// Errors that can occur when interacting with the Shopify Admin REST API.
#[derive(Debug, Error)]
pub enum RestError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse or build a request/response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}
