// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache-aside layer
//!
//! Read paths of the engine go through one shared [`CacheAside`] instance,
//! constructed by the engine and passed to each component.
//!
//! # Key families
//!
//! ```text
//! fuzzy_search_<sha256(query)>_<limit>        search results         30 min
//! catalog_<scope>_<sha256(params)>            catalog listing pages  10 min
//! smiles_product_<id>_<limit>                 product review widget  10 min
//! smiles_product_<id>_page_<n>_<limit>        product review pages   10 min
//! smiles_product_<id>_all                     neighbor navigation    10 min
//! smiles_latest_<size>                        latest reviews page 1   5 min
//! admin_categories_list / admin_complects_list reference lists       60 min
//! ```
//!
//! A product write drops `product_<id>_*` (which also reaches
//! `smiles_product_<id>_*`, see [`KeyPattern`]) plus the listing families.

mod pattern;
mod store;
mod value;

pub use pattern::KeyPattern;
pub use store::{CacheAside, CacheStats};
pub use value::{Cacheable, CachedValue};
