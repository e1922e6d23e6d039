//! # newsdesk
//!
//! Collects AI-related posts from a social platform, tags them by keyword,
//! and serves them for browsing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Social API  │──▶│   Pipeline   │──▶│  SQLite   │
//! │ search/user │   │ norm+tag+dup │   │ posts/runs│
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │(newsdesk)│       │  (/api)  │
//!                   └──────────┘       └──────────┘
//! ```
//!
//! The pipeline, normalizer, classifier and run ledger live in
//! `newsdesk-core`; this crate provides the SQLite store, the HTTP social
//! client, and the CLI and server surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations and tag seeding |
//! | [`sqlite_store`] | SQLite [`Store`](newsdesk_core::store::Store) implementation |
//! | [`social`] | HTTP social platform client |
//! | [`update`] | Ingestion run triggers |
//! | [`news`] | Read-side CLI commands |
//! | [`server`] | JSON HTTP API |

pub mod config;
pub mod db;
pub mod migrate;
pub mod news;
pub mod server;
pub mod social;
pub mod sqlite_store;
pub mod update;
