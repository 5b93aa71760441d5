// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog records.
//!
//! The [`Product`] is the core unit the engine ranks and lists. Category,
//! complect and tag links are carried on the product itself, already resolved
//! by the store in batch, so a presentation layer can render a page without
//! further lookups.

use serde::{Deserialize, Serialize};

/// Product identifier (primary key of `products`)
pub type ProductId = i64;

/// A category a product is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

impl Category {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self { id, title: title.into() }
    }
}

/// A bundle/kit grouping, distinct from a category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Complect {
    pub id: i64,
    pub title: String,
}

impl Complect {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self { id, title: title.into() }
    }
}

/// A catalog product with its relations resolved.
///
/// # Example
///
/// ```
/// use catalog_engine::{Product, Category};
///
/// let product = Product::new(42, "Розы красные")
///     .with_header("25 красных роз")
///     .with_price(1500.0)
///     .with_categories(vec![Category::new(3, "Розы")]);
///
/// assert_eq!(product.id, 42);
/// assert!(product.in_any_category(&[3, 7]));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// Display name shown on product cards
    pub header: String,
    pub description: String,
    pub price: f64,
    /// Creation timestamp (epoch millis), drives the `newest` sort
    pub created_at: i64,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub complects: Vec<Complect>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    /// Storefront partitions this product is restricted to (empty = all)
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Product {
    pub fn new(id: ProductId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            header: String::new(),
            description: String::new(),
            price: 0.0,
            created_at: 0,
            categories: Vec::new(),
            complects: Vec::new(),
            tag_ids: Vec::new(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    #[must_use]
    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    #[must_use]
    pub fn with_complects(mut self, complects: Vec<Complect>) -> Self {
        self.complects = complects;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// True when no ids are given or the product is linked to any of them.
    pub fn in_any_category(&self, ids: &[i64]) -> bool {
        ids.is_empty() || self.categories.iter().any(|c| ids.contains(&c.id))
    }

    pub fn in_any_complect(&self, ids: &[i64]) -> bool {
        ids.is_empty() || self.complects.iter().any(|c| ids.contains(&c.id))
    }

    pub fn has_any_tag(&self, ids: &[i64]) -> bool {
        ids.is_empty() || self.tag_ids.iter().any(|t| ids.contains(t))
    }

    /// Products without scope restrictions are visible in every storefront.
    pub fn visible_in(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == scope)
    }

    /// Case-insensitive substring match on title or header.
    pub fn title_or_header_contains(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.header.to_lowercase().contains(needle_lower)
    }
}

/// A customer review ("smile").
///
/// `payload` is the raw order description the review was left for. It embeds
/// the ordered product ids as quoted tokens (`"id":"42"`) and is only ever
/// matched as text, never deserialized during lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    /// Creation timestamp (epoch millis)
    pub created_at: i64,
    pub payload: String,
}

impl Review {
    pub fn new(id: i64, created_at: i64, payload: impl Into<String>) -> Self {
        Self {
            id,
            created_at,
            payload: payload.into(),
        }
    }
}

/// Minimal projection used by the fuzzy phase: id plus the scored text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: ProductId,
    pub text: String,
}
