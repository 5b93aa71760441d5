// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fuzzy Search Resolver
//!
//! # Flow
//!
//! ```text
//! search(query, limit)
//!       │
//!       ├─→ shorter than min_query_chars → []   (store untouched)
//!       │
//!       └─→ cache: fuzzy_search_<sha256>_<limit>
//!                │ miss
//!                ▼
//!        Phase 1: title/header LIKE %query%  (≤ limit rows)
//!                │
//!                ├─→ ≥ substring_short_circuit hits → return them
//!                │
//!                ▼
//!        Phase 2: candidates in the length window (id + text only)
//!                 score with Jaro-Winkler, keep > fuzzy_threshold
//!                 stable sort by score desc, take limit
//!                 re-fetch full records, return in score order
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::candidate::CandidateFilter;
use super::matcher::similarity;
use crate::cache::{CacheAside, CachedValue};
use crate::config::CatalogEngineConfig;
use crate::metrics::{self, LatencyTimer};
use crate::model::{Product, ProductId};
use crate::storage::traits::{CatalogStore, StorageError};

/// Cache key for a search: the query is trimmed and lowercased first, since
/// both phases are case-insensitive.
pub fn search_cache_key(query: &str, limit: usize) -> String {
    let normalized = query.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!("fuzzy_search_{}_{}", hex::encode(digest), limit)
}

pub struct FuzzySearchResolver {
    store: Arc<dyn CatalogStore>,
    candidates: CandidateFilter,
    cache: Arc<CacheAside<CachedValue>>,
    min_query_chars: usize,
    substring_short_circuit: usize,
    fuzzy_threshold: f64,
    ttl: Duration,
    slow_after: Duration,
    fuzzy_runs: AtomicU64,
}

impl FuzzySearchResolver {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<CacheAside<CachedValue>>, config: &CatalogEngineConfig) -> Self {
        Self {
            candidates: CandidateFilter::new(store.clone(), config),
            store,
            cache,
            min_query_chars: config.min_query_chars,
            substring_short_circuit: config.substring_short_circuit,
            fuzzy_threshold: config.fuzzy_threshold,
            ttl: config.search_ttl(),
            slow_after: Duration::from_millis(config.slow_search_ms),
            fuzzy_runs: AtomicU64::new(0),
        }
    }

    /// Number of times the scoring phase has run
    pub fn fuzzy_runs(&self) -> u64 {
        self.fuzzy_runs.load(Ordering::Relaxed)
    }

    /// Products most relevant to `query` first.
    ///
    /// Too-short queries and a zero `limit` yield an empty result, not an
    /// error. Store failures are returned as-is.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        let _timer = LatencyTimer::new("search", "fuzzy_search").slow_after(self.slow_after);

        let query = query.trim();
        if query.chars().count() < self.min_query_chars || limit == 0 {
            metrics::record_search_phase("rejected");
            return Ok(Vec::new());
        }

        let key = search_cache_key(query, limit);
        let products: Arc<Vec<Product>> = self
            .cache
            .cached(&key, self.ttl, || async { self.resolve(query, limit).await.map(Arc::new) })
            .await?;

        metrics::record_search_results(products.len());
        Ok(products.as_ref().clone())
    }

    async fn resolve(&self, query: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        let hits = self.store.find_products_containing(query, limit).await?;
        if hits.len() >= self.substring_short_circuit {
            metrics::record_search_phase("substring");
            debug!(query = %query, hits = hits.len(), "Substring phase satisfied search");
            return Ok(hits);
        }

        self.fuzzy_runs.fetch_add(1, Ordering::Relaxed);
        metrics::record_search_phase("fuzzy");

        let candidates = self.candidates.candidates(query).await?;
        metrics::record_search_candidates(candidates.len());

        let needle = query.to_lowercase();
        let mut scored: Vec<(ProductId, f64)> = candidates
            .iter()
            .map(|c| (c.id, similarity(&needle, &c.text.to_lowercase())))
            .filter(|(_, score)| *score > self.fuzzy_threshold)
            .collect();

        // Stable: equal scores keep candidate order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        debug!(
            query = %query,
            candidates = candidates.len(),
            kept = scored.len(),
            "Fuzzy phase scored candidates"
        );

        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ProductId> = scored.iter().map(|(id, _)| *id).collect();
        let mut fetched: HashMap<ProductId, Product> = self
            .store
            .products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        // Deleted between scoring and re-fetch: skipped
        Ok(ids.iter().filter_map(|id| fetched.remove(id)).collect())
    }
}
