// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::CatalogQuery;
use crate::config::SearchField;
use crate::model::{Candidate, Category, Complect, Product, ProductId, Review};

/// Backing store failures.
///
/// `Clone` so a single failed computation can be handed to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Corrupt row in '{table}': {detail}")]
    Corruption { table: &'static str, detail: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

impl StorageError {
    /// Metric label for this error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Backend(_) => "backend",
            Self::Corruption { .. } => "corruption",
            Self::NotFound { .. } => "not_found",
        }
    }
}

/// Relational backing store consumed by the engine.
///
/// Every method is one round trip. Implementations must populate product
/// relations (categories, complects, tags, scopes) in batch, never with a
/// query per product.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Products whose title or header contains `text` (case-insensitive), capped at `limit`.
    async fn find_products_containing(&self, text: &str, limit: usize) -> Result<Vec<Product>, StorageError>;

    /// Id + `field` projection of products whose `field` length (in chars) lies
    /// in `[min_chars, max_chars]`, capped at `limit`, in id order.
    async fn candidates_by_length(
        &self,
        field: SearchField,
        min_chars: usize,
        max_chars: usize,
        limit: usize,
    ) -> Result<Vec<Candidate>, StorageError>;

    /// Full records for `ids`. Missing ids are skipped; order is unspecified.
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StorageError>;

    /// Filtered, sorted, paginated listing.
    async fn list_products(&self, query: &CatalogQuery) -> Result<Vec<Product>, StorageError>;

    /// Number of products passing the filters of `query` (pagination ignored).
    async fn count_products(&self, query: &CatalogQuery) -> Result<u64, StorageError>;

    /// Products newest id first, optionally restricted to ANY of `category_ids`.
    async fn admin_products(
        &self,
        category_ids: &[i64],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StorageError>;

    /// All categories ordered by title.
    async fn categories(&self) -> Result<Vec<Category>, StorageError>;

    /// All complects ordered by title.
    async fn complects(&self) -> Result<Vec<Complect>, StorageError>;

    /// Reviews whose raw payload contains `token` literally, newest first.
    async fn reviews_matching(
        &self,
        token: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Review>, StorageError>;

    /// Reviews newest first.
    async fn latest_reviews(&self, offset: usize, limit: usize) -> Result<Vec<Review>, StorageError>;

    /// Reviews whose payload contains `text` (case-insensitive), newest first.
    async fn search_reviews(&self, text: &str, limit: usize) -> Result<Vec<Review>, StorageError>;

    /// Insert or replace a product together with its relation rows.
    async fn put_product(&self, product: &Product) -> Result<(), StorageError>;

    /// Delete a product and its relation rows. Deleting a missing id is `NotFound`.
    async fn delete_product(&self, id: ProductId) -> Result<(), StorageError>;

    async fn put_category(&self, category: &Category) -> Result<(), StorageError>;

    async fn put_complect(&self, complect: &Complect) -> Result<(), StorageError>;

    async fn put_review(&self, review: &Review) -> Result<(), StorageError>;
}
