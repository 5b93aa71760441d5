// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog listing parameters.
//!
//! A [`CatalogQuery`] is the full parameter tuple of a storefront listing:
//! scope, relation filters, price range, sort and page. It is both the input
//! to the store and the source of the listing's cache key.
//!
//! # Example
//!
//! ```rust
//! use catalog_engine::catalog::{CatalogQuery, SortOrder};
//!
//! let query = CatalogQuery::new("msk")
//!     .categories(vec![3])
//!     .price_range(Some(100.0), Some(200.0))
//!     .sort(SortOrder::PriceAsc)
//!     .page(20, 0);
//!
//! assert!(query.cache_key().starts_with("catalog_msk_"));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Product;

/// Listing order.
///
/// Ties always break on product id in the same direction as the primary key,
/// so `PriceAsc` and `PriceDesc` produce exact reverses of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    /// Most recently created first
    #[default]
    Newest,
    Oldest,
    TitleAsc,
    /// Highest id first (admin listing order)
    IdDesc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::TitleAsc => "title_asc",
            Self::IdDesc => "id_desc",
        }
    }

    /// ORDER BY clause over the `products p` alias.
    pub fn order_by_sql(self) -> &'static str {
        match self {
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::Oldest => "p.created_at ASC, p.id ASC",
            Self::TitleAsc => "p.title ASC, p.id ASC",
            Self::IdDesc => "p.id DESC",
        }
    }

    /// Same ordering as [`order_by_sql`](Self::order_by_sql), for in-process listings.
    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            Self::PriceAsc => a.price.total_cmp(&b.price).then(a.id.cmp(&b.id)),
            Self::PriceDesc => b.price.total_cmp(&a.price).then(b.id.cmp(&a.id)),
            Self::Newest => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
            Self::Oldest => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
            Self::TitleAsc => a.title.cmp(&b.title).then(a.id.cmp(&b.id)),
            Self::IdDesc => b.id.cmp(&a.id),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "title_asc" => Ok(Self::TitleAsc),
            "id_desc" => Ok(Self::IdDesc),
            other => Err(format!("unknown sort order '{}'", other)),
        }
    }
}

/// Filtered, sorted, paginated listing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Storefront partition (subdomain / tenant)
    pub scope: String,
    /// Match products in ANY of these categories (empty = no filter)
    pub category_ids: Vec<i64>,
    pub complect_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    /// Inclusive bounds
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub sort: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl CatalogQuery {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            category_ids: Vec::new(),
            complect_ids: Vec::new(),
            tag_ids: Vec::new(),
            price_min: None,
            price_max: None,
            sort: SortOrder::default(),
            limit: 20,
            offset: 0,
        }
    }

    #[must_use]
    pub fn categories(mut self, ids: Vec<i64>) -> Self {
        self.category_ids = ids;
        self
    }

    #[must_use]
    pub fn complects(mut self, ids: Vec<i64>) -> Self {
        self.complect_ids = ids;
        self
    }

    #[must_use]
    pub fn tags(mut self, ids: Vec<i64>) -> Self {
        self.tag_ids = ids;
        self
    }

    #[must_use]
    pub fn price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Does `product` pass every filter of this query (ignoring pagination)?
    pub fn matches(&self, product: &Product) -> bool {
        product.visible_in(&self.scope)
            && product.in_any_category(&self.category_ids)
            && product.in_any_complect(&self.complect_ids)
            && product.has_any_tag(&self.tag_ids)
            && self.price_min.map_or(true, |min| product.price >= min)
            && self.price_max.map_or(true, |max| product.price <= max)
    }

    /// Same query with id lists sorted and deduplicated, so equivalent
    /// filter sets share one cache entry.
    #[must_use]
    pub fn canonical(&self) -> Self {
        let mut canonical = self.clone();
        for ids in [
            &mut canonical.category_ids,
            &mut canonical.complect_ids,
            &mut canonical.tag_ids,
        ] {
            ids.sort_unstable();
            ids.dedup();
        }
        canonical
    }

    /// `catalog_<scope>_<sha256 of the canonical tuple>`
    pub fn cache_key(&self) -> String {
        let canonical = self.canonical();
        // Serializing plain ids, floats and strings cannot fail
        let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        format!("catalog_{}_{}", self.scope, hex::encode(digest))
    }
}
