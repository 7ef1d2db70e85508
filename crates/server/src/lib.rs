//! Shelftag server library.
//!
//! This crate provides the server functionality as a library,
//! allowing it to be tested and reused.
//!
//! # Architecture
//!
//! - Axum web framework exposing the `/api/products` endpoints
//! - Shopify Admin REST API client with cursor pagination
//! - Bounded-concurrency metafield writes with partial-failure reporting
//!
//! OAuth installation, webhook delivery, and session validation are
//! delegated to the embedding platform; this service only needs a store
//! domain and an Admin API token.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod routes;
pub mod shopify;
pub mod state;
