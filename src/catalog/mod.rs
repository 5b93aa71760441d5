// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Catalog listings
//!
//! ```text
//! CatalogQuery ──→ cache_key()            catalog_<scope>_<sha256>
//!      │
//!      └─→ CatalogSqlTranslator ──→ WHERE clause + params (SQL backend)
//!      └─→ CatalogQuery::matches  ──→ predicate (in-memory backend)
//! ```

mod composer;
mod query;
pub(crate) mod sql_translator;

pub use composer::CatalogComposer;
pub use query::{CatalogQuery, SortOrder};
pub use sql_translator::{CatalogSqlTranslator, SqlParam, SqlQuery};
