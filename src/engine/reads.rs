// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read API: search, listings, reviews, reference lists.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{CatalogEngine, CATEGORIES_LIST_KEY, COMPLECTS_LIST_KEY};
use crate::catalog::CatalogQuery;
use crate::metrics;
use crate::model::{Category, Complect, Product, ProductId, Review};
use crate::reviews::{ReviewNeighbors, ReviewPage};
use crate::storage::traits::StorageError;
use crate::time_operation;

/// Count the outcome of an engine call and pass it through
pub(super) fn observe<T>(operation: &'static str, result: Result<T, StorageError>) -> Result<T, StorageError> {
    match &result {
        Ok(_) => metrics::record_operation("engine", operation, "success"),
        Err(e) => {
            metrics::record_operation("engine", operation, "error");
            metrics::record_error("engine", operation, e.kind());
            warn!(operation, error = %e, "Catalog engine operation failed");
        }
    }
    result
}

impl CatalogEngine {
    // ═══════════════════════════════════════════════════════════════════════════
    // Search
    // ═══════════════════════════════════════════════════════════════════════════

    /// Products matching free text, best match first.
    ///
    /// Queries shorter than `min_query_chars` and a `limit` of 0 yield an
    /// empty list without touching the store.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        observe("search", self.search.search(query, limit).await)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Catalog
    // ═══════════════════════════════════════════════════════════════════════════

    /// One page of the storefront listing described by `query`
    pub async fn list_catalog(&self, query: &CatalogQuery) -> Result<Vec<Product>, StorageError> {
        observe("list_catalog", self.catalog.list_catalog(query).await)
    }

    /// Number of products passing the filters of `query`
    pub async fn count_catalog(&self, query: &CatalogQuery) -> Result<u64, StorageError> {
        let _timer = time_operation!("engine", "count_catalog", slow_after = self.slow_after());
        observe("count_catalog", self.catalog.count_catalog(query).await)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Reviews
    // ═══════════════════════════════════════════════════════════════════════════

    /// Reviews left for `product_id`, newest first.
    ///
    /// `page` is 1-based over `limit`-sized pages; `None` is the first `limit`.
    pub async fn reviews_for_product(
        &self,
        product_id: ProductId,
        page: Option<usize>,
        limit: usize,
    ) -> Result<Vec<Review>, StorageError> {
        observe(
            "reviews_for_product",
            self.reviews.reviews_for_product(product_id, page, limit).await,
        )
    }

    pub async fn product_review_page(&self, product_id: ProductId, page: usize) -> Result<ReviewPage, StorageError> {
        observe(
            "product_review_page",
            self.reviews.product_review_page(product_id, page).await,
        )
    }

    /// Previous/next review around `review_id` for the product's review pager
    pub async fn review_neighbors(
        &self,
        product_id: ProductId,
        review_id: i64,
    ) -> Result<Option<ReviewNeighbors>, StorageError> {
        observe(
            "review_neighbors",
            self.reviews.review_neighbors(product_id, review_id).await,
        )
    }

    pub async fn latest_reviews(&self, page: usize) -> Result<ReviewPage, StorageError> {
        observe("latest_reviews", self.reviews.latest_reviews(page).await)
    }

    pub async fn search_reviews(&self, text: &str, limit: usize) -> Result<Vec<Review>, StorageError> {
        let _timer = time_operation!("engine", "search_reviews", slow_after = self.slow_after());
        observe("search_reviews", self.reviews.search_reviews(text, limit).await)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Reference lists & admin
    // ═══════════════════════════════════════════════════════════════════════════

    /// All categories ordered by title
    pub async fn categories(&self) -> Result<Vec<Category>, StorageError> {
        let _timer = time_operation!("engine", "categories", slow_after = self.slow_after());
        let ttl = self.config.reference_lists_ttl();
        let result: Result<Arc<Vec<Category>>, StorageError> = self
            .cache
            .cached(CATEGORIES_LIST_KEY, ttl, || async {
                self.store.categories().await.map(Arc::new)
            })
            .await;
        observe("categories", result).map(|list| list.as_ref().clone())
    }

    /// All complects ordered by title
    pub async fn complects(&self) -> Result<Vec<Complect>, StorageError> {
        let _timer = time_operation!("engine", "complects", slow_after = self.slow_after());
        let ttl = self.config.reference_lists_ttl();
        let result: Result<Arc<Vec<Complect>>, StorageError> = self
            .cache
            .cached(COMPLECTS_LIST_KEY, ttl, || async {
                self.store.complects().await.map(Arc::new)
            })
            .await;
        observe("complects", result).map(|list| list.as_ref().clone())
    }

    /// Admin product list, newest id first, `admin_page_size` per 1-based page.
    ///
    /// A non-empty `category_ids` keeps products in any of those categories.
    /// Always read from the store.
    pub async fn admin_products(&self, category_ids: &[i64], page: usize) -> Result<Vec<Product>, StorageError> {
        let _timer = time_operation!("engine", "admin_products", slow_after = self.slow_after());
        let size = self.config.admin_page_size;
        let offset = page.max(1).saturating_sub(1).saturating_mul(size);

        let result = self.store.admin_products(category_ids, offset, size).await;
        if let Ok(products) = &result {
            debug!(page, categories = category_ids.len(), count = products.len(), "Admin products");
        }
        observe("admin_products", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogEngineConfig;
    use crate::storage::memory::InMemoryCatalogStore;
    use crate::storage::traits::CatalogStore;

    async fn engine_with(products: Vec<Product>, config: CatalogEngineConfig) -> (CatalogEngine, Arc<InMemoryCatalogStore>) {
        let store = Arc::new(InMemoryCatalogStore::new());
        for p in &products {
            store.put_product(p).await.unwrap();
        }
        (CatalogEngine::new(store.clone(), config), store)
    }

    #[tokio::test]
    async fn test_reference_lists_cached() {
        let (engine, store) = engine_with(Vec::new(), CatalogEngineConfig::default()).await;
        store.put_category(&Category::new(2, "Тюльпаны")).await.unwrap();
        store.put_category(&Category::new(1, "Розы")).await.unwrap();

        let first = engine.categories().await.unwrap();
        assert_eq!(first.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(), vec!["Розы", "Тюльпаны"]);

        let trips = store.round_trips();
        assert_eq!(engine.categories().await.unwrap(), first);
        assert_eq!(store.round_trips(), trips);
    }

    #[tokio::test]
    async fn test_admin_products_pages_newest_first() {
        let products = (1..=5)
            .map(|id| {
                let category = if id % 2 == 0 { 2 } else { 1 };
                Product::new(id, format!("p{}", id)).with_categories(vec![Category::new(category, "c")])
            })
            .collect();
        let config = CatalogEngineConfig {
            admin_page_size: 2,
            ..Default::default()
        };
        let (engine, _) = engine_with(products, config).await;

        let ids = |ps: Vec<Product>| ps.iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(engine.admin_products(&[], 1).await.unwrap()), vec![5, 4]);
        assert_eq!(ids(engine.admin_products(&[], 3).await.unwrap()), vec![1]);
        assert_eq!(ids(engine.admin_products(&[2], 0).await.unwrap()), vec![4, 2]);
    }

    #[tokio::test]
    async fn test_admin_products_not_cached() {
        let (engine, store) = engine_with(vec![Product::new(1, "p1")], CatalogEngineConfig::default()).await;

        engine.admin_products(&[], 1).await.unwrap();
        let trips = store.round_trips();
        engine.admin_products(&[], 1).await.unwrap();
        assert!(store.round_trips() > trips);
    }
}
