//! End-to-end tests for the collection walk-and-tag pipeline.
//!
//! Every test runs against an in-process fake Admin REST upstream; no
//! external services or credentials are required.

use reqwest::StatusCode;
use serde_json::Value;

use shelftag_integration_tests::{FakeShopify, spawn_app, test_config, test_config_with_ceiling};

async fn get_json(url: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(url).await.expect("request failed");
    let status = resp.status();
    let body = resp.json().await.expect("response was not JSON");
    (status, body)
}

// ============================================================================
// Walk and tag
// ============================================================================

#[tokio::test]
async fn test_three_pages_all_writes_succeed() {
    let upstream = FakeShopify::new(7)
        .with_pages(vec![vec![10], vec![11], vec![12]])
        .spawn()
        .await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/create/7")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["annotated"], 3);
    assert!(body.get("failed").is_none());

    // Exactly one write per product, no duplicates, no omissions.
    let mut posted = upstream.posted_ids();
    posted.sort_unstable();
    assert_eq!(posted, vec![10, 11, 12]);

    // Each write carried the configured metafield.
    let posts = upstream.metafield_posts();
    let (_, first_body) = posts.first().expect("at least one write");
    assert_eq!(first_body["metafield"]["namespace"], "custom");
    assert_eq!(first_body["metafield"]["key"], "demo_counter");
    assert_eq!(first_body["metafield"]["value"], "1");
    assert_eq!(first_body["metafield"]["type"], "number_integer");
}

#[tokio::test]
async fn test_failed_write_reported_without_aborting_batch() {
    let upstream = FakeShopify::new(7)
        .with_pages(vec![vec![10], vec![11], vec![12]])
        .with_failing_write(11)
        .spawn()
        .await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/create/7")).await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["status"], "partial_failure");
    assert_eq!(body["annotated"], 2);

    let failed = body["failed"].as_array().expect("failed list present");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["id"], 11);

    // The siblings were still written.
    let mut posted = upstream.posted_ids();
    posted.sort_unstable();
    assert_eq!(posted, vec![10, 11, 12]);
}

#[tokio::test]
async fn test_large_collection_walks_every_page() {
    // 12 single-product pages; the walk must visit every one.
    let pages: Vec<Vec<u64>> = (100..112).map(|id| vec![id]).collect();
    let upstream = FakeShopify::new(7).with_pages(pages).spawn().await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/create/7")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["annotated"], 12);
    assert_eq!(upstream.posted_ids().len(), 12);
}

#[tokio::test]
async fn test_empty_collection_is_success() {
    let upstream = FakeShopify::new(7)
        .with_pages(vec![vec![]])
        .spawn()
        .await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/create/7")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["annotated"], 0);
    assert!(upstream.posted_ids().is_empty());
}

// ============================================================================
// Enumeration failures
// ============================================================================

#[tokio::test]
async fn test_unknown_collection_is_enumeration_failure() {
    let upstream = FakeShopify::new(7)
        .with_pages(vec![vec![10]])
        .spawn()
        .await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/create/99")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Could not enumerate products");
    // The walk aborted before any write went out.
    assert!(upstream.posted_ids().is_empty());
}

#[tokio::test]
async fn test_ceiling_trips_instead_of_truncating() {
    let pages: Vec<Vec<u64>> = (1..=5u64).map(|id| vec![id]).collect();
    let upstream = FakeShopify::new(7).with_pages(pages).spawn().await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config_with_ceiling(2)).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/create/7")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Could not enumerate products");
    assert!(upstream.posted_ids().is_empty());
}

// ============================================================================
// Count delegation
// ============================================================================

#[tokio::test]
async fn test_product_count_delegates_to_upstream() {
    let upstream = FakeShopify::new(7).with_product_count(42).spawn().await;
    let app_url = spawn_app(upstream.base_url.clone(), test_config()).await;

    let (status, body) = get_json(&format!("{app_url}/api/products/count")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 42);
}
