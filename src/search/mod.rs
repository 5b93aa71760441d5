// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Product Search
//!
//! Free-text product lookup in two phases: a cheap substring match, then
//! Jaro-Winkler scoring over a length-bounded candidate set.
//!
//! # Architecture
//!
//! ```text
//! FuzzySearchResolver
//!     ├─→ CatalogStore::find_products_containing   (phase 1)
//!     ├─→ CandidateFilter → LengthWindow            (phase 2 input)
//!     └─→ similarity()                              (phase 2 scoring)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use catalog_engine::{CatalogEngineConfig, InMemoryCatalogStore, cache::CacheAside};
//! # use catalog_engine::search::FuzzySearchResolver;
//! # async fn example() {
//! let config = CatalogEngineConfig::default();
//! let store = Arc::new(InMemoryCatalogStore::new());
//! let cache = Arc::new(CacheAside::new(config.cache_max_entries));
//! let resolver = FuzzySearchResolver::new(store, cache, &config);
//!
//! let roses = resolver.search("роз", 10).await.unwrap();
//! # }
//! ```

mod candidate;
mod matcher;
mod resolver;

pub use candidate::{CandidateFilter, LengthWindow};
pub use matcher::{jaro, similarity};
pub use resolver::{search_cache_key, FuzzySearchResolver};
