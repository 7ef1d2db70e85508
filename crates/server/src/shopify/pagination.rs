//! Cursor-driven pagination over a REST collection.
//!
//! Shopify's REST list endpoints paginate via an HTTP `Link` header: each
//! page that has a successor carries a `rel="next"` directive whose URL
//! embeds an opaque `page_info` token. [`PageWalker`] follows that cursor
//! until the upstream stops sending one, concatenating every page's items
//! in fetch order. The cursor is passed through verbatim; it is never
//! synthesized, rewritten, or cached across walks.

use std::num::NonZeroU32;

use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use super::rest::AdminApi;
use super::RestError;

/// A product record from a collection page.
///
/// Only the fields the core reads are typed; everything else the upstream
/// sent rides along untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    /// Numeric product id.
    pub id: u64,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Remaining fields, passed through as-is.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Errors that can occur while walking a paginated collection.
#[derive(Debug, Error)]
pub enum WalkError {
    /// A page fetch failed; the walk cannot continue without full data.
    #[error("pagination failed at page {page}: {source}")]
    Fetch {
        page: u32,
        #[source]
        source: RestError,
    },

    /// A page body did not contain a products array.
    #[error("page {page} response had no products array")]
    MissingProducts { page: u32 },

    /// A page's products could not be deserialized.
    #[error("page {page} response was malformed: {source}")]
    MalformedPage {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    /// The optional circuit breaker fired with more pages remaining.
    #[error("page ceiling of {limit} reached with more pages remaining")]
    CeilingTripped { limit: u32 },
}

/// Extract the `page_info` cursor for the next page from a header set.
///
/// Accepts the header set of a page response; `Link` may be a single
/// comma-joined value or several pre-split values. Returns `None` when no
/// `rel="next"` directive with a parseable `page_info` is present, which is
/// the upstream's end-of-collection signal. A present-but-unparsable header
/// is treated the same way (and logged), never as an error.
#[must_use]
pub fn next_page_info(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(LINK) {
        let Ok(raw) = value.to_str() else {
            tracing::debug!("Link header was not valid UTF-8; treating as end of collection");
            continue;
        };
        for directive in raw.split(',') {
            if !directive.contains(r#"rel="next""#) {
                continue;
            }
            match capture_page_info(directive) {
                Some(cursor) => return Some(cursor.to_string()),
                None => {
                    tracing::debug!(
                        directive,
                        "rel=\"next\" directive had no parseable page_info"
                    );
                }
            }
        }
    }
    None
}

/// Capture the value of `page_info=` up to the next `&` or `>`.
fn capture_page_info(directive: &str) -> Option<&str> {
    let start = directive.find("page_info=")? + "page_info=".len();
    let rest = directive.get(start..)?;
    let end = rest.find(['&', '>']).unwrap_or(rest.len());
    let cursor = rest.get(..end)?;
    (!cursor.is_empty()).then_some(cursor)
}

/// Walks a paginated collection endpoint and materializes every item.
///
/// The walk is strictly sequential: each request depends on the cursor
/// returned by the previous page. Termination is driven solely by cursor
/// absence; the optional ceiling exists only as a circuit breaker and
/// trips loudly instead of truncating.
#[derive(Debug, Clone)]
pub struct PageWalker {
    path: String,
    page_size: u32,
    ceiling: Option<NonZeroU32>,
}

impl PageWalker {
    /// Create a walker over `path` fetching `page_size` items per page.
    #[must_use]
    pub const fn new(path: String, page_size: u32) -> Self {
        Self {
            path,
            page_size,
            ceiling: None,
        }
    }

    /// Set the circuit-breaker page limit.
    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: Option<NonZeroU32>) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Fetch every page and return the concatenated items in server order.
    ///
    /// The first request carries only `limit`; follow-ups carry `limit`
    /// and the verbatim `page_info` cursor from the previous response.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::Fetch` if any page fetch fails (the walk aborts),
    /// `WalkError::MissingProducts`/`MalformedPage` if a page body does not
    /// have the expected shape, and `WalkError::CeilingTripped` if the
    /// configured circuit breaker fires.
    #[instrument(skip(self, client), fields(path = %self.path, page_size = self.page_size))]
    pub async fn collect_all<C: AdminApi>(&self, client: &C) -> Result<Vec<Product>, WalkError> {
        let page_size = self.page_size.to_string();
        let mut items: Vec<Product> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page: u32 = 0;

        loop {
            page += 1;

            let response = match &cursor {
                None => client.get(&self.path, &[("limit", page_size.as_str())]).await,
                Some(info) => {
                    client
                        .get(
                            &self.path,
                            &[("limit", page_size.as_str()), ("page_info", info.as_str())],
                        )
                        .await
                }
            }
            .map_err(|source| WalkError::Fetch { page, source })?;

            let mut page_items = parse_products(&response.body, page)?;
            tracing::debug!(page, count = page_items.len(), "fetched collection page");
            items.append(&mut page_items);

            match next_page_info(&response.headers) {
                None => return Ok(items),
                Some(next) => {
                    if let Some(limit) = self.ceiling
                        && page >= limit.get()
                    {
                        tracing::warn!(
                            pages = page,
                            limit = limit.get(),
                            "page ceiling tripped with more pages remaining; refusing to truncate"
                        );
                        return Err(WalkError::CeilingTripped { limit: limit.get() });
                    }
                    cursor = Some(next);
                }
            }
        }
    }
}

/// Pull the products array out of a page body.
fn parse_products(body: &serde_json::Value, page: u32) -> Result<Vec<Product>, WalkError> {
    let products = body
        .get("products")
        .ok_or(WalkError::MissingProducts { page })?;
    serde_json::from_value(products.clone()).map_err(|source| WalkError::MalformedPage {
        page,
        source,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use reqwest::header::HeaderValue;
    use serde_json::json;

    use super::super::rest::RestResponse;
    use super::*;

    fn link_headers(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(LINK, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    // =========================================================================
    // Cursor parser
    // =========================================================================

    #[test]
    fn test_extracts_cursor_from_next_directive() {
        let headers = link_headers(&[
            r#"<https://x.myshopify.com/admin/api/2026-01/products.json?page_info=ABC123>; rel="next", <https://x.myshopify.com/products.json?page_info=ZZZ>; rel="previous""#,
        ]);
        assert_eq!(next_page_info(&headers).as_deref(), Some("ABC123"));
    }

    #[test]
    fn test_cursor_stops_at_ampersand() {
        let headers = link_headers(&[
            r#"<https://x.myshopify.com/products.json?page_info=tok-42&limit=1>; rel="next""#,
        ]);
        assert_eq!(next_page_info(&headers).as_deref(), Some("tok-42"));
    }

    #[test]
    fn test_no_next_directive_is_end_of_collection() {
        let headers =
            link_headers(&[r#"<https://x.myshopify.com/products.json?page_info=A>; rel="previous""#]);
        assert_eq!(next_page_info(&headers), None);
    }

    #[test]
    fn test_next_without_page_info_is_end_of_collection() {
        let headers = link_headers(&[r#"<https://x.myshopify.com/products.json>; rel="next""#]);
        assert_eq!(next_page_info(&headers), None);
    }

    #[test]
    fn test_empty_header_set() {
        assert_eq!(next_page_info(&HeaderMap::new()), None);
    }

    #[test]
    fn test_pre_split_header_values() {
        // Some stacks deliver Link as repeated header values instead of one
        // comma-joined string.
        let headers = link_headers(&[
            r#"<https://x.myshopify.com/products.json?page_info=P>; rel="previous""#,
            r#"<https://x.myshopify.com/products.json?page_info=N>; rel="next""#,
        ]);
        assert_eq!(next_page_info(&headers).as_deref(), Some("N"));
    }

    #[test]
    fn test_header_name_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "link",
            HeaderValue::from_static(r#"<https://x/p.json?page_info=LC>; rel="next""#),
        );
        assert_eq!(next_page_info(&headers).as_deref(), Some("LC"));
    }

    #[test]
    fn test_capture_page_info_at_end_of_url() {
        assert_eq!(
            capture_page_info(r#"<https://x/p.json?page_info=END>; rel="next""#),
            Some("END")
        );
    }

    // =========================================================================
    // PageWalker
    // =========================================================================

    /// Scripted collaborator that replays canned page responses and records
    /// every request it receives.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<RestResponse, RestError>>>,
        calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<RestResponse, RestError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AdminApi for ScriptedApi {
        async fn get(
            &self,
            path: &str,
            query: &[(&str, &str)],
        ) -> Result<RestResponse, RestError> {
            self.calls.lock().unwrap().push((
                path.to_string(),
                query
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("walker fetched more pages than scripted")
        }

        async fn post(
            &self,
            _path: &str,
            _body: &serde_json::Value,
        ) -> Result<RestResponse, RestError> {
            unreachable!("walker never posts")
        }
    }

    fn page(ids: &[u64], next_cursor: Option<&str>) -> RestResponse {
        let products: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "title": format!("Product {id}")}))
            .collect();
        let headers = next_cursor.map_or_else(HeaderMap::new, |cursor| {
            link_headers(&[&format!(
                r#"<https://x.myshopify.com/products.json?page_info={cursor}&limit=1>; rel="next""#
            )])
        });
        RestResponse {
            body: json!({ "products": products }),
            headers,
        }
    }

    #[tokio::test]
    async fn test_concatenates_pages_in_fetch_order() {
        let api = ScriptedApi::new(vec![
            Ok(page(&[10], Some("c1"))),
            Ok(page(&[11], Some("c2"))),
            Ok(page(&[12], None)),
        ]);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 1);

        let products = walker.collect_all(&api).await.unwrap();

        assert_eq!(
            products.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![10, 11, 12]
        );
        assert_eq!(products[0].title, "Product 10");
    }

    #[tokio::test]
    async fn test_cursor_passed_through_verbatim() {
        let api = ScriptedApi::new(vec![
            Ok(page(&[1], Some("opaque%2Btoken"))),
            Ok(page(&[2], None)),
        ]);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 5);

        walker.collect_all(&api).await.unwrap();

        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        // First request: limit only, no cursor.
        assert_eq!(
            calls[0].1,
            vec![("limit".to_string(), "5".to_string())]
        );
        // Second request: limit plus the unmodified cursor.
        assert_eq!(
            calls[1].1,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("page_info".to_string(), "opaque%2Btoken".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_hardcoded_page_limit() {
        // 25 pages; nothing but cursor absence may stop the walk.
        let mut responses: Vec<Result<RestResponse, RestError>> = (0..24)
            .map(|i| Ok(page(&[i], Some(&format!("c{i}")))))
            .collect();
        responses.push(Ok(page(&[24], None)));
        let api = ScriptedApi::new(responses);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 1);

        let products = walker.collect_all(&api).await.unwrap();

        assert_eq!(products.len(), 25);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_with_page_number() {
        let api = ScriptedApi::new(vec![
            Ok(page(&[10], Some("c1"))),
            Err(RestError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
        ]);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 1);

        let err = walker.collect_all(&api).await.unwrap_err();

        assert!(matches!(err, WalkError::Fetch { page: 2, .. }));
        assert!(err.to_string().starts_with("pagination failed at page 2"));
    }

    #[tokio::test]
    async fn test_ceiling_trips_instead_of_truncating() {
        let api = ScriptedApi::new(vec![
            Ok(page(&[1], Some("c1"))),
            Ok(page(&[2], Some("c2"))),
        ]);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 1)
            .with_ceiling(NonZeroU32::new(2));

        let err = walker.collect_all(&api).await.unwrap_err();

        assert!(matches!(err, WalkError::CeilingTripped { limit: 2 }));
    }

    #[tokio::test]
    async fn test_ceiling_does_not_fire_on_final_page() {
        let api = ScriptedApi::new(vec![Ok(page(&[1], Some("c1"))), Ok(page(&[2], None))]);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 1)
            .with_ceiling(NonZeroU32::new(2));

        let products = walker.collect_all(&api).await.unwrap();

        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_products_array_is_an_error() {
        let api = ScriptedApi::new(vec![Ok(RestResponse {
            body: json!({"errors": "Not Found"}),
            headers: HeaderMap::new(),
        })]);
        let walker = PageWalker::new("collections/7/products.json".to_string(), 1);

        let err = walker.collect_all(&api).await.unwrap_err();

        assert!(matches!(err, WalkError::MissingProducts { page: 1 }));
    }
}
