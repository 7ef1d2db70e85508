//! Product API handlers.
//!
//! The annotate endpoint is the walk-and-tag pipeline end to end: fully
//! materialize the collection via [`PageWalker`], then write the configured
//! metafield to every product via [`BatchAnnotator`]. A failed walk is a
//! gateway error; failed writes degrade the response to a partial-failure
//! report instead of an opaque 500.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use crate::error::AppError;
use crate::shopify::metafields::{BatchAnnotator, BatchStatus};
use crate::shopify::pagination::PageWalker;
use crate::state::AppState;

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products/count", get(count))
        .route(
            "/api/products/create/{collection_id}",
            get(annotate_collection),
        )
}

/// Response for the product count endpoint.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// A single failed metafield write.
#[derive(Debug, Serialize)]
pub struct FailedWrite {
    pub id: u64,
    pub error: String,
}

/// Response for the annotate endpoint.
#[derive(Debug, Serialize)]
pub struct AnnotateResponse {
    pub status: &'static str,
    pub annotated: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedWrite>,
}

/// Get the store-wide product count.
///
/// # Route
///
/// `GET /api/products/count`
///
/// # Errors
///
/// Returns an error if the upstream count call fails.
pub async fn count(State(state): State<AppState>) -> Result<Json<CountResponse>, AppError> {
    let count = state.rest().product_count().await?;
    Ok(Json(CountResponse { count }))
}

/// Walk a collection and write the configured metafield to every product.
///
/// Responds `200` with `"success"` only when every write succeeded, and
/// `207` with a per-id failure list when some writes failed. A failed walk
/// aborts before any write is issued.
///
/// # Route
///
/// `GET /api/products/create/{collection_id}`
///
/// # Errors
///
/// Returns an error if the collection cannot be fully enumerated.
pub async fn annotate_collection(
    State(state): State<AppState>,
    Path(collection_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let config = state.config();

    let walker = PageWalker::new(
        format!("collections/{collection_id}/products.json"),
        config.page_size,
    )
    .with_ceiling(config.page_ceiling);

    let products = walker.collect_all(state.rest()).await?;
    tracing::info!(
        collection_id,
        products = products.len(),
        "collection walk complete"
    );

    let annotator = BatchAnnotator::new(config.metafield.clone(), config.max_in_flight);
    let report = annotator.annotate_all(state.rest(), &products).await;

    let annotated = report.succeeded();
    let failed: Vec<FailedWrite> = report
        .failed()
        .into_iter()
        .map(|(id, error)| FailedWrite { id, error })
        .collect();

    let (status, label) = match report.status() {
        BatchStatus::Success => (StatusCode::OK, "success"),
        BatchStatus::PartialFailure => {
            tracing::warn!(
                collection_id,
                failed = failed.len(),
                annotated,
                "some metafield writes failed"
            );
            (StatusCode::MULTI_STATUS, "partial_failure")
        }
    };

    Ok((
        status,
        Json(AnnotateResponse {
            status: label,
            annotated,
            failed,
        }),
    ))
}
