// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write API and cache invalidation.
//!
//! Every write reaches the store first. Only after it succeeds are the
//! affected cache entries dropped, synchronously, so the next read through
//! this engine sees the new state.

use tracing::{debug, info};

use super::reads::observe;
use super::{CatalogEngine, ProductMutation, ProductMutationListener, CATEGORIES_LIST_KEY, COMPLECTS_LIST_KEY};
use crate::metrics;
use crate::model::{Category, Complect, Product, ProductId, Review};
use crate::storage::traits::StorageError;
use crate::time_operation;

impl CatalogEngine {
    /// Insert or replace a product with its relations
    pub async fn save_product(&self, product: &Product) -> Result<(), StorageError> {
        let _timer = time_operation!("engine", "save_product", slow_after = self.slow_after());
        observe("save_product", self.store.put_product(product).await)?;
        self.apply_mutation(ProductMutation::Saved(product.id));
        Ok(())
    }

    /// Remove a product. `NotFound` when there was nothing to remove.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), StorageError> {
        let _timer = time_operation!("engine", "delete_product", slow_after = self.slow_after());
        observe("delete_product", self.store.delete_product(id).await)?;
        self.apply_mutation(ProductMutation::Deleted(id));
        Ok(())
    }

    pub async fn save_category(&self, category: &Category) -> Result<(), StorageError> {
        observe("save_category", self.store.put_category(category).await)?;
        self.drop_reference_list(CATEGORIES_LIST_KEY);
        Ok(())
    }

    pub async fn save_complect(&self, complect: &Complect) -> Result<(), StorageError> {
        observe("save_complect", self.store.put_complect(complect).await)?;
        self.drop_reference_list(COMPLECTS_LIST_KEY);
        Ok(())
    }

    /// Store a review and drop every cached review list
    pub async fn save_review(&self, review: &Review) -> Result<(), StorageError> {
        observe("save_review", self.store.put_review(review).await)?;
        let removed = self.cache.invalidate_matching("smiles_*");
        debug!(review_id = review.id, removed, "Review lists invalidated");
        Ok(())
    }

    /// Drop every cache entry that can hold `product_id`.
    ///
    /// Always removes `product_<id>_*` and `smiles_product_<id>_*`; with
    /// `invalidate_listings_on_write` also every catalog listing and search
    /// result. Returns the number of entries removed.
    pub fn invalidate_product(&self, product_id: ProductId) -> usize {
        let mut removed = self.cache.invalidate_matching(&format!("product_{}_*", product_id));
        removed += self
            .cache
            .invalidate_matching(&format!("smiles_product_{}_*", product_id));

        if self.config.invalidate_listings_on_write {
            removed += self.cache.invalidate_matching("catalog_*");
            removed += self.cache.invalidate_matching("fuzzy_search_*");
        }
        removed
    }

    fn apply_mutation(&self, mutation: ProductMutation) -> usize {
        let product_id = mutation.product_id();
        let mut removed = self.invalidate_product(product_id);
        // A save may create referenced categories and complects
        removed += usize::from(self.cache.invalidate(CATEGORIES_LIST_KEY));
        removed += usize::from(self.cache.invalidate(COMPLECTS_LIST_KEY));

        metrics::record_product_write(mutation.kind(), removed);
        metrics::set_cache_entries(self.cache.len());
        info!(product_id, kind = mutation.kind(), removed, "Product cache invalidated");
        removed
    }

    fn drop_reference_list(&self, key: &str) {
        if self.cache.invalidate(key) {
            debug!(key, "Reference list invalidated");
        }
    }
}

impl ProductMutationListener for CatalogEngine {
    fn on_product_mutation(&self, mutation: ProductMutation) -> usize {
        self.apply_mutation(mutation)
    }
}
