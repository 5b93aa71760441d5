// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Embedded-reference review lookup.
//!
//! Reviews reference the products they were left for only inside their raw
//! order payload, as `"id":"<product_id>"`. Lookup matches that literal token
//! against the payload text; the payload is never parsed. The closing quote
//! keeps product `5` from matching a payload for product `55`.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheAside, CachedValue};
use crate::config::CatalogEngineConfig;
use crate::metrics::LatencyTimer;
use crate::model::{ProductId, Review};
use crate::storage::traits::{CatalogStore, StorageError};

/// Literal token identifying `product_id` inside a review payload
pub fn product_token(product_id: ProductId) -> String {
    format!("\"id\":\"{}\"", product_id)
}

/// One page of reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    /// The page came back full, so another may follow
    pub has_more: bool,
}

/// Adjacent reviews within one product's newest-first list. Navigation wraps
/// around: the first review's `previous` is the last one and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewNeighbors {
    pub previous: i64,
    pub next: i64,
}

/// 1-based page number to row offset; page 0 is read as page 1.
fn page_offset(page: usize, size: usize) -> usize {
    page.max(1).saturating_sub(1).saturating_mul(size)
}

pub struct ReviewLookup {
    store: Arc<dyn CatalogStore>,
    cache: Arc<CacheAside<CachedValue>>,
    ttl: Duration,
    latest_ttl: Duration,
    page_size: usize,
    min_query_chars: usize,
    slow_after: Duration,
}

impl ReviewLookup {
    pub fn new(store: Arc<dyn CatalogStore>, cache: Arc<CacheAside<CachedValue>>, config: &CatalogEngineConfig) -> Self {
        Self {
            store,
            cache,
            ttl: config.reviews_ttl(),
            latest_ttl: config.latest_reviews_ttl(),
            page_size: config.review_page_size,
            min_query_chars: config.min_query_chars,
            slow_after: Duration::from_millis(config.slow_operation_ms),
        }
    }

    /// Reviews of `product_id`, newest first.
    ///
    /// Without a page this is the first `limit` reviews; with one it is the
    /// 1-based `page` of `limit`-sized pages. Each variant has its own cache
    /// entry under the product's `smiles_product_<id>_` namespace.
    pub async fn reviews_for_product(
        &self,
        product_id: ProductId,
        page: Option<usize>,
        limit: usize,
    ) -> Result<Vec<Review>, StorageError> {
        let _timer = LatencyTimer::new("reviews", "product_reviews").slow_after(self.slow_after);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (key, offset) = match page {
            None => (format!("smiles_product_{}_{}", product_id, limit), 0),
            Some(page) => (
                format!("smiles_product_{}_page_{}_{}", product_id, page.max(1), limit),
                page_offset(page, limit),
            ),
        };

        let reviews: Arc<Vec<Review>> = self
            .cache
            .cached(&key, self.ttl, || async {
                self.store
                    .reviews_matching(&product_token(product_id), offset, Some(limit))
                    .await
                    .map(Arc::new)
            })
            .await?;

        Ok(reviews.as_ref().clone())
    }

    /// Page of `review_page_size` reviews for a product
    pub async fn product_review_page(&self, product_id: ProductId, page: usize) -> Result<ReviewPage, StorageError> {
        let reviews = self.reviews_for_product(product_id, Some(page), self.page_size).await?;
        Ok(self.page_of(reviews))
    }

    /// Every review of `product_id`, newest first
    pub async fn all_reviews_for_product(&self, product_id: ProductId) -> Result<Arc<Vec<Review>>, StorageError> {
        let key = format!("smiles_product_{}_all", product_id);
        self.cache
            .cached(&key, self.ttl, || async {
                self.store
                    .reviews_matching(&product_token(product_id), 0, None)
                    .await
                    .map(Arc::new)
            })
            .await
    }

    /// Previous/next review ids around `review_id` in the product's list.
    /// `None` when the review is not among the product's reviews.
    pub async fn review_neighbors(
        &self,
        product_id: ProductId,
        review_id: i64,
    ) -> Result<Option<ReviewNeighbors>, StorageError> {
        let reviews = self.all_reviews_for_product(product_id).await?;
        let neighbors = neighbors_of(&reviews, review_id);
        debug!(product_id, review_id, found = neighbors.is_some(), "Review neighbors");
        Ok(neighbors)
    }

    /// Latest reviews across all products. Page 1 is cached.
    pub async fn latest_reviews(&self, page: usize) -> Result<ReviewPage, StorageError> {
        let _timer = LatencyTimer::new("reviews", "latest_reviews").slow_after(self.slow_after);
        let page = page.max(1);

        let reviews = if page == 1 {
            let key = format!("smiles_latest_{}", self.page_size);
            let cached: Arc<Vec<Review>> = self
                .cache
                .cached(&key, self.latest_ttl, || async {
                    self.store.latest_reviews(0, self.page_size).await.map(Arc::new)
                })
                .await?;
            cached.as_ref().clone()
        } else {
            self.store
                .latest_reviews(page_offset(page, self.page_size), self.page_size)
                .await?
        };

        Ok(self.page_of(reviews))
    }

    /// Reviews whose payload contains `text`. Uncached; short input yields nothing.
    pub async fn search_reviews(&self, text: &str, limit: usize) -> Result<Vec<Review>, StorageError> {
        let text = text.trim();
        if text.chars().count() < self.min_query_chars || limit == 0 {
            return Ok(Vec::new());
        }
        self.store.search_reviews(text, limit).await
    }

    fn page_of(&self, reviews: Vec<Review>) -> ReviewPage {
        let has_more = self.page_size > 0 && reviews.len() >= self.page_size;
        ReviewPage { reviews, has_more }
    }
}

fn neighbors_of(reviews: &[Review], review_id: i64) -> Option<ReviewNeighbors> {
    let index = reviews.iter().position(|r| r.id == review_id)?;
    let previous = if index > 0 { &reviews[index - 1] } else { reviews.last()? };
    let next = reviews.get(index + 1).or_else(|| reviews.first())?;
    Some(ReviewNeighbors {
        previous: previous.id,
        next: next.id,
    })
}
