//! # DocVault
//!
//! A local-first document identity and tracking service for
//! product-data-management workflows.
//!
//! DocVault ingests files together with structured metadata and an optional
//! JSON side document, assigns each a content-derived identity, stores that
//! identity in an indexed record store, and later reconciles a directory's
//! tracked state against the live filesystem.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌───────────────┐
//! │ Fingerprinter │──▶│  Archive  │──▶│ Record store  │
//! │ request→key   │   │  upsert   │   │ SQLite / mem  │
//! └──────────────┘   └─────┬─────┘   └───────┬───────┘
//!                          │                 │
//!                    ┌─────▼─────┐     ┌─────▼─────┐
//!                    │ Directory │     │ Resolver  │
//!                    │  Index    │────▶│ + Scanner │
//!                    └───────────┘     └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dv init                             # create database
//! dv import part.001.step             # fingerprint + archive + index
//! dv documents /ws/parts              # resolved document set
//! dv scan /ws/parts                   # reconcile against disk
//! dv serve                            # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`settings`] | Mutable local settings (JSON) |
//! | [`models`] | Core data types |
//! | [`fingerprint`] | Deterministic import fingerprinting |
//! | [`archive`] | Idempotent document upsert |
//! | [`dirindex`] | Capacity-bounded directory buckets |
//! | [`resolver`] | Precedence-based identity resolution |
//! | [`scan`] | Filesystem reconciliation scanning |
//! | [`engine`] | Component wiring and high-level operations |
//! | [`store`] | Record-store trait + SQLite / in-memory backends |
//! | [`blob`] | Content-addressable blob store |
//! | [`plugins`] | Plugin-subscription synchronization |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod archive;
pub mod blob;
pub mod config;
pub mod db;
pub mod dirindex;
pub mod engine;
pub mod fingerprint;
pub mod locks;
pub mod migrate;
pub mod models;
pub mod plugins;
pub mod resolver;
pub mod scan;
pub mod server;
pub mod settings;
pub mod store;
