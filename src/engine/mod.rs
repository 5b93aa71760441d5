// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog engine facade.
//!
//! The [`CatalogEngine`] wires the storefront read paths to one shared
//! cache and one backing store:
//! - fuzzy product search
//! - cached catalog listings
//! - review lookup by embedded product reference
//! - reference lists and the admin product listing
//!
//! Writes go through the store first and then drop every cache entry that
//! could now be stale (see [`ProductMutation`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use catalog_engine::{CatalogEngine, CatalogEngineConfig, CatalogQuery, Product, SortOrder};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = CatalogEngine::connect(CatalogEngineConfig::default())
//!     .await
//!     .expect("connect failed");
//!
//! engine.save_product(&Product::new(1, "Розы красные").with_price(150.0)).await.unwrap();
//!
//! let found = engine.search("роз", 10).await.unwrap();
//! let page = engine
//!     .list_catalog(&CatalogQuery::new("msk").sort(SortOrder::PriceAsc))
//!     .await
//!     .unwrap();
//! # let _ = (found, page);
//! # }
//! ```

mod reads;
mod types;
mod writes;

pub use types::{ProductMutation, ProductMutationListener};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::cache::{CacheAside, CacheStats, CachedValue};
use crate::catalog::CatalogComposer;
use crate::config::CatalogEngineConfig;
use crate::metrics;
use crate::reviews::ReviewLookup;
use crate::search::FuzzySearchResolver;
use crate::storage::memory::InMemoryCatalogStore;
use crate::storage::sql::SqlCatalogStore;
use crate::storage::traits::{CatalogStore, StorageError};

/// Cache key of the category reference list
pub const CATEGORIES_LIST_KEY: &str = "admin_categories_list";
/// Cache key of the complect reference list
pub const COMPLECTS_LIST_KEY: &str = "admin_complects_list";

/// Storefront catalog engine.
///
/// `Send + Sync`; share it behind an `Arc`. Every component holds the same
/// store and cache, so an invalidation through the engine is seen by all
/// read paths at once.
pub struct CatalogEngine {
    pub(super) config: CatalogEngineConfig,
    pub(super) store: Arc<dyn CatalogStore>,
    pub(super) cache: Arc<CacheAside<CachedValue>>,
    pub(super) search: FuzzySearchResolver,
    pub(super) catalog: CatalogComposer,
    pub(super) reviews: ReviewLookup,
}

impl CatalogEngine {
    /// Engine over `store` with a cache sized from `config`.
    ///
    /// `cache_enabled = false` gives a cache that never stores anything, so
    /// every read reaches the store.
    pub fn new(store: Arc<dyn CatalogStore>, config: CatalogEngineConfig) -> Self {
        let cache = if config.cache_enabled {
            CacheAside::new(config.cache_max_entries)
        } else {
            CacheAside::disabled()
        };
        Self::with_cache(store, Arc::new(cache), config)
    }

    /// Engine over an existing cache, e.g. one shared with another engine.
    pub fn with_cache(
        store: Arc<dyn CatalogStore>,
        cache: Arc<CacheAside<CachedValue>>,
        config: CatalogEngineConfig,
    ) -> Self {
        let search = FuzzySearchResolver::new(store.clone(), cache.clone(), &config);
        let catalog = CatalogComposer::new(store.clone(), cache.clone(), &config);
        let reviews = ReviewLookup::new(store.clone(), cache.clone(), &config);

        Self {
            config,
            store,
            cache,
            search,
            catalog,
            reviews,
        }
    }

    /// Connect the backing store named by `config.sql_url` and build the engine.
    ///
    /// Without a URL the engine runs on an empty in-memory store.
    pub async fn connect(config: CatalogEngineConfig) -> Result<Self, StorageError> {
        let start = Instant::now();

        let store: Arc<dyn CatalogStore> = match config.sql_url.as_deref() {
            Some(url) => Arc::new(SqlCatalogStore::connect(url).await?),
            None => {
                info!("No sql_url configured, using in-memory catalog store");
                Arc::new(InMemoryCatalogStore::new())
            }
        };

        metrics::record_startup_phase("connect", start.elapsed());
        info!(
            cache_enabled = config.cache_enabled,
            cache_max_entries = config.cache_max_entries,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Catalog engine ready"
        );

        Ok(Self::new(store, config))
    }

    #[must_use]
    pub fn config(&self) -> &CatalogEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheAside<CachedValue>> {
        &self.cache
    }

    /// Snapshot of cache counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop expired cache entries now rather than on their next read.
    pub fn purge_expired(&self) -> usize {
        let purged = self.cache.purge_expired();
        metrics::set_cache_entries(self.cache.len());
        purged
    }

    pub(super) fn slow_after(&self) -> Duration {
        Duration::from_millis(self.config.slow_operation_ms)
    }
}
