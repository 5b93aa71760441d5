// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process catalog store.
//!
//! Evaluates the same predicates the SQL backend pushes into the database.
//! Every trait call counts as one round trip, which lets tests assert that a
//! cached path never reached the store.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{CatalogStore, StorageError};
use crate::catalog::{CatalogQuery, SortOrder};
use crate::config::SearchField;
use crate::model::{Candidate, Category, Complect, Product, ProductId, Review};

pub struct InMemoryCatalogStore {
    products: DashMap<ProductId, Product>,
    categories: DashMap<i64, Category>,
    complects: DashMap<i64, Complect>,
    reviews: DashMap<i64, Review>,
    round_trips: AtomicU64,
}

impl InMemoryCatalogStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            categories: DashMap::new(),
            complects: DashMap::new(),
            reviews: DashMap::new(),
            round_trips: AtomicU64::new(0),
        }
    }

    /// Number of trait calls served so far
    #[must_use]
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    fn trip(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }

    fn filtered(&self, predicate: impl Fn(&Product) -> bool) -> Vec<Product> {
        self.products
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn sorted_reviews(&self, predicate: impl Fn(&Review) -> bool) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .reviews
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        reviews
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

fn page<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_products_containing(&self, text: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        self.trip();
        let needle = text.to_lowercase();
        let mut hits = self.filtered(|p| p.title_or_header_contains(&needle));
        hits.sort_by_key(|p| p.id);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn candidates_by_length(
        &self,
        field: SearchField,
        min_chars: usize,
        max_chars: usize,
        limit: usize,
    ) -> Result<Vec<Candidate>, StorageError> {
        self.trip();
        let mut candidates: Vec<Candidate> = self
            .products
            .iter()
            .filter_map(|entry| {
                let product = entry.value();
                let text = match field {
                    SearchField::Title => &product.title,
                    SearchField::Header => &product.header,
                };
                let chars = text.chars().count();
                (min_chars..=max_chars).contains(&chars).then(|| Candidate {
                    id: product.id,
                    text: text.clone(),
                })
            })
            .collect();
        candidates.sort_by_key(|c| c.id);
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StorageError> {
        self.trip();
        Ok(ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|p| p.value().clone()))
            .collect())
    }

    async fn list_products(&self, query: &CatalogQuery) -> Result<Vec<Product>, StorageError> {
        self.trip();
        let mut products = self.filtered(|p| query.matches(p));
        products.sort_by(|a, b| query.sort.compare(a, b));
        Ok(page(products, query.offset, query.limit))
    }

    async fn count_products(&self, query: &CatalogQuery) -> Result<u64, StorageError> {
        self.trip();
        Ok(self.filtered(|p| query.matches(p)).len() as u64)
    }

    async fn admin_products(
        &self,
        category_ids: &[i64],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StorageError> {
        self.trip();
        let mut products = self.filtered(|p| p.in_any_category(category_ids));
        products.sort_by(|a, b| SortOrder::IdDesc.compare(a, b));
        Ok(page(products, offset, limit))
    }

    async fn categories(&self) -> Result<Vec<Category>, StorageError> {
        self.trip();
        let mut categories: Vec<Category> = self.categories.iter().map(|c| c.value().clone()).collect();
        categories.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn complects(&self) -> Result<Vec<Complect>, StorageError> {
        self.trip();
        let mut complects: Vec<Complect> = self.complects.iter().map(|c| c.value().clone()).collect();
        complects.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(complects)
    }

    async fn reviews_matching(
        &self,
        token: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Review>, StorageError> {
        self.trip();
        let reviews = self.sorted_reviews(|r| r.payload.contains(token));
        Ok(page(reviews, offset, limit.unwrap_or(usize::MAX)))
    }

    async fn latest_reviews(&self, offset: usize, limit: usize) -> Result<Vec<Review>, StorageError> {
        self.trip();
        Ok(page(self.sorted_reviews(|_| true), offset, limit))
    }

    async fn search_reviews(&self, text: &str, limit: usize) -> Result<Vec<Review>, StorageError> {
        self.trip();
        let needle = text.to_lowercase();
        let reviews = self.sorted_reviews(|r| r.payload.to_lowercase().contains(&needle));
        Ok(page(reviews, 0, limit))
    }

    async fn put_product(&self, product: &Product) -> Result<(), StorageError> {
        self.trip();
        let mut product = product.clone();
        // Join pairs are unique
        product.categories.sort_by_key(|c| c.id);
        product.categories.dedup_by_key(|c| c.id);
        product.complects.sort_by_key(|c| c.id);
        product.complects.dedup_by_key(|c| c.id);
        product.tag_ids.sort_unstable();
        product.tag_ids.dedup();
        product.scopes.sort();
        product.scopes.dedup();

        // Referenced categories/complects are created if absent, never renamed
        for linked in product.categories.iter_mut() {
            let stored = self.categories.entry(linked.id).or_insert_with(|| linked.clone());
            linked.title = stored.title.clone();
        }
        for linked in product.complects.iter_mut() {
            let stored = self.complects.entry(linked.id).or_insert_with(|| linked.clone());
            linked.title = stored.title.clone();
        }

        self.products.insert(product.id, product);
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StorageError> {
        self.trip();
        self.products
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound { entity: "product", id })
    }

    async fn put_category(&self, category: &Category) -> Result<(), StorageError> {
        self.trip();
        self.categories.insert(category.id, category.clone());
        for mut product in self.products.iter_mut() {
            for linked in product.categories.iter_mut().filter(|c| c.id == category.id) {
                linked.title = category.title.clone();
            }
        }
        Ok(())
    }

    async fn put_complect(&self, complect: &Complect) -> Result<(), StorageError> {
        self.trip();
        self.complects.insert(complect.id, complect.clone());
        for mut product in self.products.iter_mut() {
            for linked in product.complects.iter_mut().filter(|c| c.id == complect.id) {
                linked.title = complect.title.clone();
            }
        }
        Ok(())
    }

    async fn put_review(&self, review: &Review) -> Result<(), StorageError> {
        self.trip();
        self.reviews.insert(review.id, review.clone());
        Ok(())
    }
}
