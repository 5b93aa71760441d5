// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Catalog Engine
//!
//! Read-heavy storefront catalog service: fuzzy product search, cached
//! catalog listings and review lookup, in front of a relational store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CatalogEngine                         │
//! │  • search()        FuzzySearchResolver (substring → fuzzy)  │
//! │  • list_catalog()  CatalogComposer                          │
//! │  • reviews_*()     ReviewLookup (embedded "id" tokens)      │
//! │  • save_*()        write-through + synchronous invalidation │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  CacheAside<CachedValue>                    │
//! │  • DashMap entries with per-entry TTL                      │
//! │  • Single-flight: one producer per key under concurrency   │
//! │  • Glob invalidation (product_42_*, catalog_*)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (miss)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 CatalogStore (SQLite/MySQL)                 │
//! │  • Ground truth                                            │
//! │  • Relations loaded in batch, never per product            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_engine::{CatalogEngine, CatalogEngineConfig, CatalogQuery, Category, Product, SortOrder};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CatalogEngineConfig {
//!         sql_url: Some("sqlite://catalog.db?mode=rwc".into()),
//!         ..Default::default()
//!     };
//!     let engine = CatalogEngine::connect(config).await.expect("Failed to connect");
//!
//!     engine
//!         .save_product(
//!             &Product::new(1, "Розы красные")
//!                 .with_price(150.0)
//!                 .with_categories(vec![Category::new(3, "Розы")]),
//!         )
//!         .await
//!         .expect("Failed to save");
//!
//!     // Typo-tolerant search
//!     for product in engine.search("роз", 10).await.unwrap() {
//!         println!("{} {}", product.id, product.title);
//!     }
//!
//!     // Cached listing page
//!     let query = CatalogQuery::new("msk")
//!         .categories(vec![3])
//!         .price_range(Some(100.0), Some(200.0))
//!         .sort(SortOrder::PriceAsc)
//!         .page(20, 0);
//!     let page = engine.list_catalog(&query).await.unwrap();
//!     println!("{} products", page.len());
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`CatalogEngineConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`engine`]: The [`CatalogEngine`] facade and mutation hooks
//! - [`search`]: Lexical matcher, candidate filter, fuzzy resolver
//! - [`catalog`]: Listing queries and their SQL translation
//! - [`reviews`]: Review lookup by embedded product reference
//! - [`cache`]: Cache-aside store with single-flight
//! - [`storage`]: Storage backends (SQL, Memory)
//! - [`resilience`]: Retry with backoff

pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod model;
pub mod resilience;
pub mod reviews;
pub mod search;
pub mod storage;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use cache::CacheStats;
pub use catalog::{CatalogQuery, SortOrder};
pub use config::{CatalogEngineConfig, SearchField};
pub use engine::{CatalogEngine, ProductMutation, ProductMutationListener};
pub use metrics::LatencyTimer;
pub use model::{Candidate, Category, Complect, Product, ProductId, Review};
pub use resilience::retry::{retry, RetryConfig};
pub use reviews::{ReviewNeighbors, ReviewPage};
pub use storage::memory::InMemoryCatalogStore;
pub use storage::sql::SqlCatalogStore;
pub use storage::traits::{CatalogStore, StorageError};
