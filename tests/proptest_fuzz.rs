// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Property-based tests (fuzzing) for the catalog engine.
//!
//! Uses proptest to generate arbitrary text, keys and price lists and
//! verify the pure parts of the engine hold their invariants: scores stay
//! in range, windows stay ordered, invalidation patterns stay targeted and
//! listings sort consistently.
//!
//! Run with: `cargo test --test proptest_fuzz`

use proptest::prelude::*;

use catalog_engine::cache::KeyPattern;
use catalog_engine::catalog::{CatalogQuery, SortOrder};
use catalog_engine::search::{jaro, search_cache_key, similarity, LengthWindow};
use catalog_engine::Product;

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Mixed Cyrillic/Latin words, the shape of real product titles
fn title_strategy() -> impl Strategy<Value = String> {
    "[а-яА-Яa-zA-Z0-9 ]{1,40}"
}

fn priced_products_strategy() -> impl Strategy<Value = Vec<Product>> {
    prop::collection::vec(0u32..500, 1..40).prop_map(|prices| {
        prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| Product::new(i as i64 + 1, format!("p{}", i)).with_price(f64::from(price)))
            .collect()
    })
}

// =============================================================================
// Lexical Matcher
// =============================================================================

proptest! {
    /// Scores are always in [0, 1], never NaN
    #[test]
    fn fuzz_similarity_in_unit_range(a in ".{0,50}", b in ".{0,50}") {
        let score = similarity(&a, &b);
        prop_assert!(!score.is_nan());
        prop_assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
    }

    /// Identical non-empty strings are a perfect match
    #[test]
    fn fuzz_similarity_identity(a in title_strategy()) {
        prop_assert!((similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    /// The prefix boost never lowers a score
    #[test]
    fn fuzz_winkler_not_below_jaro(a in title_strategy(), b in title_strategy()) {
        prop_assert!(similarity(&a, &b) + 1e-9 >= jaro(&a, &b));
    }
}

// =============================================================================
// Candidate Window
// =============================================================================

proptest! {
    /// The query's own length is always inside its window
    #[test]
    fn fuzz_window_contains_query(query in ".{0,60}", below in 0usize..50, above in 0usize..50) {
        let window = LengthWindow::around(&query, below, above);
        prop_assert!(window.min_chars <= window.max_chars);
        prop_assert!(window.contains(&query));
    }

    /// Bounds never underflow for short queries
    #[test]
    fn fuzz_window_floor_at_zero(query in ".{0,5}", below in 5usize..100) {
        let window = LengthWindow::around(&query, below, 30);
        prop_assert_eq!(window.min_chars, 0);
    }
}

// =============================================================================
// Cache Keys & Invalidation Patterns
// =============================================================================

proptest! {
    /// A product pattern drops every key of that product and no key of another
    #[test]
    fn fuzz_product_pattern_is_targeted(id in 1i64..100_000, other in 1i64..100_000, suffix in "[a-z0-9_]{1,20}") {
        prop_assume!(id != other);
        let pattern = KeyPattern::new(&format!("product_{}_*", id));

        let own_key = format!("product_{}_{}", id, suffix);
        let smiles_key = format!("smiles_product_{}_{}", id, suffix);
        let other_key = format!("product_{}_{}", other, suffix);
        prop_assert!(pattern.matches(&own_key));
        prop_assert!(pattern.matches(&smiles_key));
        prop_assert!(!pattern.matches(&other_key));
    }

    /// Search keys ignore surrounding whitespace and letter case
    #[test]
    fn fuzz_search_key_normalized(query in "[а-яa-z]{3,20}", limit in 1usize..100) {
        let padded = format!("  {}  ", query.to_uppercase());
        prop_assert_eq!(search_cache_key(&query, limit), search_cache_key(&padded, limit));
    }

    /// Catalog keys do not depend on filter list order or duplicates
    #[test]
    fn fuzz_catalog_key_canonical(mut ids in prop::collection::vec(1i64..50, 0..10)) {
        let first = CatalogQuery::new("msk").categories(ids.clone()).cache_key();
        ids.reverse();
        ids.extend(ids.clone());
        let second = CatalogQuery::new("msk").categories(ids).cache_key();
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Sorting
// =============================================================================

proptest! {
    /// price_desc is exactly price_asc reversed, ties included
    #[test]
    fn fuzz_price_sort_reversal(products in priced_products_strategy()) {
        let mut asc = products.clone();
        asc.sort_by(|a, b| SortOrder::PriceAsc.compare(a, b));
        let mut desc = products;
        desc.sort_by(|a, b| SortOrder::PriceDesc.compare(a, b));
        desc.reverse();

        let asc_ids: Vec<i64> = asc.iter().map(|p| p.id).collect();
        let desc_ids: Vec<i64> = desc.iter().map(|p| p.id).collect();
        prop_assert_eq!(asc_ids, desc_ids);
    }

    /// Inclusive bounds: a product priced exactly at either bound passes
    #[test]
    fn fuzz_price_range_inclusive(min in 0u32..1000, span in 0u32..1000) {
        let max = min + span;
        let query = CatalogQuery::new("msk").price_range(Some(f64::from(min)), Some(f64::from(max)));

        prop_assert!(query.matches(&Product::new(1, "a").with_price(f64::from(min))));
        prop_assert!(query.matches(&Product::new(2, "b").with_price(f64::from(max))));
        prop_assert!(!query.matches(&Product::new(3, "c").with_price(f64::from(max) + 0.5)));
    }
}
