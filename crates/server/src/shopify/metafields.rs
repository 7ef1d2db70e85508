//! Bounded-concurrency metafield writes over an accumulated product set.
//!
//! [`BatchAnnotator`] issues one metafield upsert per product. Writes run
//! concurrently up to a configurable in-flight maximum so a large batch
//! cannot stampede the upstream rate budget, and every write runs to
//! completion: one failure never cancels its siblings. Result slots are
//! index-aligned with the input sequence regardless of completion timing.

use futures::{StreamExt, stream};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

use super::RestError;
use super::pagination::Product;
use super::rest::{AdminApi, RestResponse};

/// The metafield written to each product.
#[derive(Debug, Clone, Serialize)]
pub struct MetafieldSpec {
    /// Metafield namespace.
    pub namespace: String,
    /// Metafield key.
    pub key: String,
    /// Metafield value, serialized as a string.
    pub value: String,
    /// Shopify metafield type (e.g., `number_integer`).
    #[serde(rename = "type")]
    pub value_type: String,
}

impl Default for MetafieldSpec {
    fn default() -> Self {
        Self {
            namespace: "custom".to_string(),
            key: "demo_counter".to_string(),
            value: "1".to_string(),
            value_type: "number_integer".to_string(),
        }
    }
}

impl MetafieldSpec {
    /// Request body for `POST /products/{id}/metafields.json`.
    fn request_body(&self) -> serde_json::Value {
        json!({ "metafield": self })
    }
}

/// Outcome of a single product's metafield write.
#[derive(Debug)]
pub struct AnnotationOutcome {
    /// The product the write targeted.
    pub product_id: u64,
    /// The product's display title.
    pub title: String,
    /// The write result: upstream response, or the error that failed it.
    pub result: Result<RestResponse, RestError>,
}

/// Aggregate status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every write succeeded (vacuously true for an empty batch).
    Success,
    /// At least one write failed; the rest still completed.
    PartialFailure,
}

/// Per-item outcomes of one batch, slot-aligned with the input sequence.
#[derive(Debug)]
pub struct BatchReport {
    /// One outcome per input product, in input order.
    pub outcomes: Vec<AnnotationOutcome>,
}

impl BatchReport {
    /// Aggregate status: partial failure if any write failed.
    #[must_use]
    pub fn status(&self) -> BatchStatus {
        if self.outcomes.iter().any(|o| o.result.is_err()) {
            BatchStatus::PartialFailure
        } else {
            BatchStatus::Success
        }
    }

    /// Number of successful writes.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// The failed writes as `(product_id, error)` pairs, in input order.
    #[must_use]
    pub fn failed(&self) -> Vec<(u64, String)> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.result
                    .as_ref()
                    .err()
                    .map(|e| (o.product_id, e.to_string()))
            })
            .collect()
    }
}

/// Applies one metafield write per product with bounded concurrency.
#[derive(Debug, Clone)]
pub struct BatchAnnotator {
    spec: MetafieldSpec,
    max_in_flight: usize,
}

impl BatchAnnotator {
    /// Create an annotator writing `spec` with at most `max_in_flight`
    /// concurrent requests.
    #[must_use]
    pub fn new(spec: MetafieldSpec, max_in_flight: usize) -> Self {
        Self {
            spec,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Write the metafield to every product, collecting per-item outcomes.
    ///
    /// Issues exactly one `POST /products/{id}/metafields.json` per input
    /// product. `buffered` keeps at most `max_in_flight` writes in flight
    /// and yields results in input order, so slot `i` of the report always
    /// corresponds to input product `i`.
    #[instrument(skip(self, client, products), fields(count = products.len(), max_in_flight = self.max_in_flight))]
    pub async fn annotate_all<C: AdminApi>(
        &self,
        client: &C,
        products: &[Product],
    ) -> BatchReport {
        let body = self.spec.request_body();

        // Materialize the (inert) write futures before streaming them:
        // feeding the borrowing closure straight into `stream::iter` trips
        // a rustc higher-ranked lifetime limitation (#89976) once the
        // handler future must be `Send`.
        let writes: Vec<_> = products
            .iter()
            .map(|product| {
                let body = body.clone();
                async move {
                    let path = format!("products/{}/metafields.json", product.id);
                    let result = client.post(&path, &body).await;
                    match &result {
                        Ok(_) => {
                            tracing::debug!(
                                product_id = product.id,
                                title = %product.title,
                                "metafield written"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                product_id = product.id,
                                error = %e,
                                "metafield write failed"
                            );
                        }
                    }
                    AnnotationOutcome {
                        product_id: product.id,
                        title: product.title.clone(),
                        result,
                    }
                }
            })
            .collect();

        let outcomes = stream::iter(writes)
            .buffered(self.max_in_flight)
            .collect::<Vec<_>>()
            .await;

        BatchReport { outcomes }
    }
}
