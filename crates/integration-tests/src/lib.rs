//! Integration test harness for Shelftag.
//!
//! Stands up an in-process fake of the Shopify Admin REST API and a real
//! Shelftag router wired to it, both on ephemeral loopback ports, so the
//! whole pipeline (REST client, page walk, metafield writes, handlers)
//! runs hermetically with no external credentials.
//!
//! # Usage
//!
//! ```rust,ignore
//! let upstream = FakeShopify::new(7)
//!     .with_pages(vec![vec![10], vec![11], vec![12]])
//!     .spawn()
//!     .await;
//! let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;
//!
//! let resp = reqwest::get(format!("{app_url}/api/products/create/7")).await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header::LINK},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};

use shelftag_server::config::{AppConfig, ShopifyAdminConfig};
use shelftag_server::routes;
use shelftag_server::shopify::RestClient;
use shelftag_server::shopify::metafields::MetafieldSpec;
use shelftag_server::state::AppState;

/// Scripted fake of the Admin REST API.
///
/// Serves one collection split into pages chained by `Link` headers, a
/// store-wide product count, and a metafield endpoint that records every
/// write and fails the configured ids.
pub struct FakeShopify {
    collection_id: u64,
    pages: Vec<Vec<u64>>,
    product_count: u64,
    failing_write_ids: HashSet<u64>,
}

impl FakeShopify {
    /// Create a fake upstream serving `collection_id`.
    #[must_use]
    pub fn new(collection_id: u64) -> Self {
        Self {
            collection_id,
            pages: Vec::new(),
            product_count: 0,
            failing_write_ids: HashSet::new(),
        }
    }

    /// Script the collection's pages (product ids per page, in order).
    #[must_use]
    pub fn with_pages(mut self, pages: Vec<Vec<u64>>) -> Self {
        self.pages = pages;
        self
    }

    /// Script the store-wide product count.
    #[must_use]
    pub fn with_product_count(mut self, count: u64) -> Self {
        self.product_count = count;
        self
    }

    /// Make the metafield write for `id` fail with a 422.
    #[must_use]
    pub fn with_failing_write(mut self, id: u64) -> Self {
        self.failing_write_ids.insert(id);
        self
    }

    /// Bind an ephemeral loopback port and serve the fake upstream.
    pub async fn spawn(self) -> FakeUpstream {
        let posts = Arc::new(Mutex::new(Vec::new()));
        let state = UpstreamState {
            inner: Arc::new(self),
            posts: Arc::clone(&posts),
        };

        let app = Router::new()
            .route(
                "/collections/{collection_id}/products.json",
                get(collection_products),
            )
            .route("/products/count.json", get(product_count))
            .route("/products/{product_id}/metafields.json", post(create_metafield))
            .with_state(state);

        let base_url = serve(app).await;

        FakeUpstream { base_url, posts }
    }
}

/// Handle to a running fake upstream.
pub struct FakeUpstream {
    /// Base URL of the fake upstream (`http://127.0.0.1:{port}`).
    pub base_url: String,
    posts: Arc<Mutex<Vec<(u64, Value)>>>,
}

impl FakeUpstream {
    /// Every metafield write received, as `(product_id, body)` pairs.
    #[must_use]
    pub fn metafield_posts(&self) -> Vec<(u64, Value)> {
        self.posts.lock().expect("posts lock poisoned").clone()
    }

    /// The product ids that received a metafield write.
    #[must_use]
    pub fn posted_ids(&self) -> Vec<u64> {
        self.metafield_posts().into_iter().map(|(id, _)| id).collect()
    }
}

#[derive(Clone)]
struct UpstreamState {
    inner: Arc<FakeShopify>,
    posts: Arc<Mutex<Vec<(u64, Value)>>>,
}

async fn collection_products(
    State(state): State<UpstreamState>,
    Path(collection_id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if collection_id != state.inner.collection_id {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"errors": "Not Found"})),
        )
            .into_response();
    }

    // Cursor scheme: page N is reachable via page_info=pageN.
    let index = match params.get("page_info") {
        None => 0,
        Some(info) => match info.strip_prefix("page").and_then(|n| n.parse::<usize>().ok()) {
            Some(i) if i < state.inner.pages.len() => i,
            _ => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"errors": "Invalid page_info"})),
                )
                    .into_response();
            }
        },
    };

    let products: Vec<Value> = state
        .inner
        .pages
        .get(index)
        .map(|ids| {
            ids.iter()
                .map(|id| json!({"id": id, "title": format!("Product {id}")}))
                .collect()
        })
        .unwrap_or_default();

    // Shopify sends previous and next directives in one comma-joined value.
    let mut directives = Vec::new();
    if index > 0 {
        directives.push(format!(
            "<https://fake.myshopify.com/admin/api/2026-01/collections/{collection_id}/products.json?page_info=page{}&limit=1>; rel=\"previous\"",
            index - 1
        ));
    }
    if index + 1 < state.inner.pages.len() {
        directives.push(format!(
            "<https://fake.myshopify.com/admin/api/2026-01/collections/{collection_id}/products.json?page_info=page{}&limit=1>; rel=\"next\"",
            index + 1
        ));
    }

    let mut headers = HeaderMap::new();
    if !directives.is_empty() {
        headers.insert(
            LINK,
            HeaderValue::from_str(&directives.join(", ")).expect("valid Link header"),
        );
    }

    (headers, Json(json!({ "products": products }))).into_response()
}

async fn product_count(State(state): State<UpstreamState>) -> Json<Value> {
    Json(json!({ "count": state.inner.product_count }))
}

async fn create_metafield(
    State(state): State<UpstreamState>,
    Path(product_id): Path<u64>,
    Json(body): Json<Value>,
) -> Response {
    state
        .posts
        .lock()
        .expect("posts lock poisoned")
        .push((product_id, body));

    if state.inner.failing_write_ids.contains(&product_id) {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"errors": {"metafield": ["simulated upstream failure"]}})),
        )
            .into_response()
    } else {
        (
            StatusCode::CREATED,
            Json(json!({"metafield": {"id": product_id * 1000, "owner_id": product_id}})),
        )
            .into_response()
    }
}

/// Configuration for a Shelftag instance under test.
///
/// One product per page so small scripted collections still exercise the
/// cursor loop.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".parse().expect("valid loopback address"),
        port: 0,
        shopify: ShopifyAdminConfig {
            store: "test.myshopify.com".to_string(),
            api_version: "2026-01".to_string(),
            admin_token: SecretString::from("shpat_integration_test"),
        },
        page_size: 1,
        max_in_flight: 2,
        page_ceiling: None,
        request_timeout: Duration::from_secs(5),
        metafield: MetafieldSpec::default(),
        sentry_dsn: None,
    }
}

/// Configuration with the circuit-breaker ceiling set.
#[must_use]
pub fn test_config_with_ceiling(ceiling: u32) -> AppConfig {
    AppConfig {
        page_ceiling: NonZeroU32::new(ceiling),
        ..test_config()
    }
}

/// Spawn a real Shelftag router wired to `upstream_base_url`.
///
/// Returns the app's base URL.
pub async fn spawn_app(upstream_base_url: String, config: AppConfig) -> String {
    let rest = RestClient::with_base_url(&config.shopify, config.request_timeout, upstream_base_url)
        .expect("failed to build REST client");
    let state = AppState::with_rest(config, rest);

    let app = Router::new().merge(routes::routes()).with_state(state);

    serve(app).await
}

/// Bind an ephemeral loopback port, serve `app`, return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().expect("listener has local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server error");
    });

    format!("http://{addr}")
}
