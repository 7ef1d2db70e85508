//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /api/products/count                    - Store-wide product count
//! GET  /api/products/create/{collection_id}   - Walk the collection and tag every product
//! ```

use axum::Router;

use crate::state::AppState;

pub mod products;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new().merge(products::router())
}
