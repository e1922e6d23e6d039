//! # newsdesk core
//!
//! Runtime-agnostic logic for newsdesk: data models, the raw payload
//! normalizer, the keyword tag classifier, the storage and social-client
//! abstractions, the run ledger, and the ingestion pipeline.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Native
//! adapters (SQLite store, HTTP social client, CLI, server) live in the
//! `newsdesk` crate.

pub mod classify;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod social;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
