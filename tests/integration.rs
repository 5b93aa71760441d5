// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests for Catalog Engine
//!
//! End-to-end runs of the engine against the SQLite backend. Each test gets
//! its own database file in a temp directory, so no external services are
//! needed.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `search_*` - substring and fuzzy search
//! - `catalog_*` - listings, filters, sorting, caching
//! - `reviews_*` - embedded-reference lookup and paging
//! - `write_*` - mutations and cache invalidation

use catalog_engine::{
    CatalogEngine, CatalogEngineConfig, CatalogQuery, Category, Complect, Product, Review, ReviewNeighbors, SortOrder,
    StorageError,
};
use tempfile::TempDir;

// =============================================================================
// Helpers
// =============================================================================

async fn engine(dir: &TempDir) -> CatalogEngine {
    let config = CatalogEngineConfig {
        sql_url: Some(format!("sqlite://{}?mode=rwc", dir.path().join("catalog.db").display())),
        ..Default::default()
    };
    CatalogEngine::connect(config).await.expect("connect")
}

fn roses() -> Category {
    Category::new(3, "Розы")
}

async fn seed_bouquets(engine: &CatalogEngine) {
    let products = [
        Product::new(1, "Розы красные").with_header("Букет роз").with_price(150.0).with_created_at(10),
        Product::new(2, "Тюльпан").with_header("Тюльпаны").with_price(90.0).with_created_at(20),
        Product::new(3, "Пионы").with_header("Пионы садовые").with_price(200.0).with_created_at(30),
        Product::new(4, "Розы белые").with_header("Белые розы").with_price(100.0).with_created_at(40),
        Product::new(5, "Розы кустовые").with_header("Кустовые розы").with_price(150.0).with_created_at(50),
    ];
    for product in products {
        let product = if product.title.starts_with("Розы") {
            product.with_categories(vec![roses()])
        } else {
            product
        };
        engine.save_product(&product).await.expect("save");
    }
}

fn ids(products: &[Product]) -> Vec<i64> {
    products.iter().map(|p| p.id).collect()
}

fn review(id: i64, created_at: i64, product_ids: &[i64]) -> Review {
    let lines: Vec<String> = product_ids
        .iter()
        .map(|pid| format!(r#"{{"id":"{}","title":"Букет","qty":1}}"#, pid))
        .collect();
    Review::new(id, created_at, format!("[{}]", lines.join(",")))
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn search_short_prefix_finds_roses_not_tulips() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let found = engine.search("роз", 10).await.unwrap();

    assert!(found.iter().any(|p| p.title == "Розы красные"));
    assert!(found.iter().all(|p| p.title != "Тюльпан"));
}

#[tokio::test]
async fn search_rejects_short_queries() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    assert!(engine.search("ро", 10).await.unwrap().is_empty());
    assert!(engine.search("   ", 10).await.unwrap().is_empty());
    assert!(engine.search("розы", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_respects_limit_and_returns_full_records() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let found = engine.search("Розы", 2).await.unwrap();

    assert!(found.len() <= 2);
    assert!(!found.is_empty());
    assert!(found.iter().all(|p| p.categories.contains(&roses())));
}

#[tokio::test]
async fn search_repeat_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let first = engine.search("тюльпан", 10).await.unwrap();
    let hits = engine.cache_stats().hits;
    let second = engine.search("  ТЮЛЬПАН ", 10).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.cache_stats().hits, hits + 1);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn catalog_price_range_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let query = CatalogQuery::new("msk").price_range(Some(100.0), Some(200.0));
    let products = engine.list_catalog(&query).await.unwrap();

    assert_eq!(products.len(), 4);
    assert!(products.iter().all(|p| (100.0..=200.0).contains(&p.price)));
    assert_eq!(engine.count_catalog(&query).await.unwrap(), 4);
}

#[tokio::test]
async fn catalog_sort_reversal() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let base = CatalogQuery::new("msk");
    let asc = engine.list_catalog(&base.clone().sort(SortOrder::PriceAsc)).await.unwrap();
    let mut desc = ids(&engine.list_catalog(&base.sort(SortOrder::PriceDesc)).await.unwrap());
    desc.reverse();

    // Equal prices (1 and 5) tie-break on id
    assert_eq!(ids(&asc), vec![2, 4, 1, 5, 3]);
    assert_eq!(ids(&asc), desc);
}

#[tokio::test]
async fn catalog_filters_and_pagination() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;
    engine
        .save_product(
            &Product::new(6, "Розы в коробке")
                .with_price(300.0)
                .with_categories(vec![roses()])
                .with_complects(vec![Complect::new(8, "Коробка")])
                .with_tags(vec![77])
                .with_scopes(vec!["spb".into()]),
        )
        .await
        .unwrap();

    let in_roses = CatalogQuery::new("msk").categories(vec![3]).sort(SortOrder::IdDesc);
    assert_eq!(ids(&engine.list_catalog(&in_roses).await.unwrap()), vec![5, 4, 1]);

    let spb = CatalogQuery::new("spb").categories(vec![3]).sort(SortOrder::IdDesc);
    assert_eq!(ids(&engine.list_catalog(&spb).await.unwrap()), vec![6, 5, 4, 1]);

    let tagged = CatalogQuery::new("spb").tags(vec![77]).complects(vec![8]);
    assert_eq!(ids(&engine.list_catalog(&tagged).await.unwrap()), vec![6]);

    let second_page = CatalogQuery::new("msk").sort(SortOrder::PriceAsc).page(2, 2);
    assert_eq!(ids(&engine.list_catalog(&second_page).await.unwrap()), vec![1, 5]);
    assert_eq!(engine.count_catalog(&second_page).await.unwrap(), 5);
}

#[tokio::test]
async fn catalog_repeat_listing_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let query = CatalogQuery::new("msk").categories(vec![3]).page(20, 0);
    let first = engine.list_catalog(&query).await.unwrap();
    let misses = engine.cache_stats().misses;
    let second = engine.list_catalog(&query).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.cache_stats().misses, misses);
    assert!(engine.cache().get(&query.cache_key()).is_some());
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn reviews_token_does_not_match_longer_ids() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    engine.save_review(&review(1, 10, &[5])).await.unwrap();
    engine.save_review(&review(2, 20, &[55])).await.unwrap();
    engine.save_review(&review(3, 30, &[12, 5])).await.unwrap();

    let for_five: Vec<i64> = engine
        .reviews_for_product(5, None, 12)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(for_five, vec![3, 1]);
    assert_eq!(engine.reviews_for_product(55, None, 12).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reviews_neighbors_and_pages() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    for id in 1..=3 {
        engine.save_review(&review(id, id * 10, &[9])).await.unwrap();
    }

    assert_eq!(
        engine.review_neighbors(9, 3).await.unwrap(),
        Some(ReviewNeighbors { previous: 1, next: 2 })
    );
    assert_eq!(engine.review_neighbors(9, 42).await.unwrap(), None);

    let page = engine.product_review_page(9, 1).await.unwrap();
    assert_eq!(page.reviews.len(), 3);
    assert!(!page.has_more);

    let latest = engine.latest_reviews(1).await.unwrap();
    assert_eq!(latest.reviews[0].id, 3);

    let found = engine.search_reviews("Букет", 10).await.unwrap();
    assert_eq!(found.len(), 3);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn write_save_is_visible_to_next_read() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let query = CatalogQuery::new("msk").categories(vec![3]).sort(SortOrder::PriceAsc);
    assert_eq!(engine.list_catalog(&query).await.unwrap()[0].id, 4);

    engine
        .save_product(
            &Product::new(5, "Розы кустовые")
                .with_price(50.0)
                .with_categories(vec![roses()]),
        )
        .await
        .unwrap();

    assert_eq!(engine.list_catalog(&query).await.unwrap()[0].id, 5);
}

#[tokio::test]
async fn write_delete_removes_from_listing_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;

    let query = CatalogQuery::new("msk");
    assert_eq!(engine.list_catalog(&query).await.unwrap().len(), 5);
    assert!(!engine.search("тюльпан", 10).await.unwrap().is_empty());

    engine.delete_product(2).await.unwrap();

    assert_eq!(engine.list_catalog(&query).await.unwrap().len(), 4);
    assert!(engine.search("тюльпан", 10).await.unwrap().is_empty());
    assert!(matches!(
        engine.delete_product(2).await,
        Err(StorageError::NotFound { .. })
    ));
}

#[tokio::test]
async fn write_reference_lists_and_admin_listing() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    seed_bouquets(&engine).await;
    engine.save_category(&Category::new(1, "Пионы")).await.unwrap();

    let titles: Vec<String> = engine.categories().await.unwrap().into_iter().map(|c| c.title).collect();
    assert_eq!(titles, vec!["Пионы", "Розы"]);

    engine.save_category(&Category::new(2, "Тюльпаны")).await.unwrap();
    assert_eq!(engine.categories().await.unwrap().len(), 3);

    let admin = engine.admin_products(&[3], 1).await.unwrap();
    assert_eq!(ids(&admin), vec![5, 4, 1]);
    assert!(admin.iter().all(|p| p.categories.contains(&roses())));
}
