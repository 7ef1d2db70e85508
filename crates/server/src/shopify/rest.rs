//! Shopify Admin REST API client.
//!
//! The [`AdminApi`] trait is the seam between the walk-and-tag core and the
//! upstream platform: one authenticated `GET` with query parameters and one
//! `POST` with a JSON body, both returning the response body together with
//! its header set. [`RestClient`] is the production implementation; tests
//! substitute scripted implementations or point the client at an in-process
//! upstream via [`RestClient::with_base_url`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::ShopifyAdminConfig;

use super::RestError;

/// A response from the Admin REST API.
///
/// Headers are kept as a [`HeaderMap`] so lookups are case-insensitive
/// (`Link` vs `link`) and multi-valued headers survive intact.
#[derive(Debug)]
pub struct RestResponse {
    /// Parsed JSON response body.
    pub body: serde_json::Value,
    /// Response headers.
    pub headers: HeaderMap,
}

/// The upstream platform collaborator.
///
/// Everything the walk-and-tag core needs from Shopify: an authenticated
/// `GET path?query` and a `POST path` with a JSON body. Implemented by
/// [`RestClient`] in production and by scripted fakes in tests.
pub trait AdminApi {
    /// Perform an authenticated `GET` against `path` with query parameters.
    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> impl Future<Output = Result<RestResponse, RestError>> + Send;

    /// Perform an authenticated `POST` against `path` with a JSON body.
    fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<RestResponse, RestError>> + Send;
}

/// Shopify Admin REST API client.
///
/// Cheaply cloneable; constructed once and injected through `AppState`
/// rather than looked up through process-global SDK state.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl RestClient {
    /// Create a new Admin REST client for a store.
    ///
    /// # Errors
    ///
    /// Returns `RestError::Parse` if the access token is not a valid header
    /// value, or `RestError::Http` if the HTTP client fails to build.
    pub fn new(config: &ShopifyAdminConfig, timeout: Duration) -> Result<Self, RestError> {
        let base_url = format!(
            "https://{}/admin/api/{}",
            config.store, config.api_version
        );
        Self::with_base_url(config, timeout, base_url)
    }

    /// Create a client against an explicit base URL.
    ///
    /// Used by tests to point the client at an in-process fake upstream.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RestClient::new`].
    pub fn with_base_url(
        config: &ShopifyAdminConfig,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self, RestError> {
        let mut headers = HeaderMap::new();

        let mut token = HeaderValue::from_str(config.admin_token.expose_secret())
            .map_err(|e| RestError::Parse(format!("Invalid access token format: {e}")))?;
        token.set_sensitive(true);
        headers.insert("X-Shopify-Access-Token", token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestClientInner { client, base_url }),
        })
    }

    /// Get the total product count for the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the response has no
    /// `count` field.
    #[instrument(skip(self))]
    pub async fn product_count(&self) -> Result<u64, RestError> {
        let response = self.get("products/count.json", &[]).await?;
        response
            .body
            .get("count")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| RestError::Parse("count response missing count field".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path.trim_start_matches('/'))
    }

    async fn handle(response: reqwest::Response) -> Result<RestResponse, RestError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(RestError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(RestError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RestError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let headers = response.headers().clone();
        let body = response.json().await?;

        Ok(RestResponse { body, headers })
    }
}

impl AdminApi for RestClient {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<RestResponse, RestError> {
        let response = self
            .inner
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        Self::handle(response).await
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<RestResponse, RestError> {
        let response = self
            .inner
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?;
        Self::handle(response).await
    }
}
