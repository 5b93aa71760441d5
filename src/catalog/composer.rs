// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog Query Composer
//!
//! Storefront listing pages, cached per full parameter tuple.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::query::CatalogQuery;
use crate::cache::{CacheAside, CachedValue};
use crate::config::CatalogEngineConfig;
use crate::metrics::{self, LatencyTimer};
use crate::model::Product;
use crate::storage::traits::{CatalogStore, StorageError};

pub struct CatalogComposer {
    store: Arc<dyn CatalogStore>,
    cache: Arc<CacheAside<CachedValue>>,
    ttl: Duration,
    slow_after: Duration,
}

impl CatalogComposer {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<CacheAside<CachedValue>>, config: &CatalogEngineConfig) -> Self {
        Self {
            store,
            cache,
            ttl: config.catalog_ttl(),
            slow_after: Duration::from_millis(config.slow_catalog_ms),
        }
    }

    /// One page of the filtered, sorted listing.
    ///
    /// Repeated calls with an equal query inside the TTL are served from the
    /// cache without reaching the store.
    pub async fn list_catalog(&self, query: &CatalogQuery) -> Result<Vec<Product>, StorageError> {
        let timer = LatencyTimer::new("catalog", "list_catalog");
        let key = query.cache_key();
        let computed = AtomicBool::new(false);

        let products: Arc<Vec<Product>> = self
            .cache
            .cached(&key, self.ttl, || async {
                computed.store(true, Ordering::Relaxed);
                self.store.list_products(query).await.map(Arc::new)
            })
            .await
            .inspect_err(|e| metrics::record_error("catalog", "list_catalog", e.kind()))?;

        let elapsed = timer.elapsed();
        if elapsed > self.slow_after {
            metrics::record_slow_operation("catalog", "list_catalog");
            warn!(
                scope = %query.scope,
                sort = %query.sort,
                cached = !computed.load(Ordering::Relaxed),
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow catalog listing"
            );
        } else {
            debug!(scope = %query.scope, cached = !computed.load(Ordering::Relaxed), count = products.len(), "Catalog listing");
        }

        Ok(products.as_ref().clone())
    }

    /// Total number of products matching the filters of `query`. Uncached.
    pub async fn count_catalog(&self, query: &CatalogQuery) -> Result<u64, StorageError> {
        self.store.count_products(query).await
    }
}
