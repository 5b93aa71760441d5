// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL catalog backend (SQLite or MySQL through the sqlx `Any` driver).
//!
//! Schema:
//! ```sql
//! products            (id PK, title, header, description, price, created_at)
//! categories          (id PK, title)
//! complects           (id PK, title)
//! categories_products (category_id, product_id)  UNIQUE pair
//! product_complects   (product_id, complect_id)  UNIQUE pair
//! products_tags       (product_id, tag_id)       UNIQUE pair
//! product_scopes      (product_id, scope)        UNIQUE pair
//! smiles              (id PK, created_at, json_order)
//! ```
//!
//! Listing filters are pushed into SQL (see [`CatalogSqlTranslator`]). The
//! relations of a result page are then loaded with one `IN (...)` query per
//! relation table, never one query per product.
//!
//! ## sqlx Any Driver Quirks
//!
//! - MySQL TEXT columns may come back as bytes, so text is read as `String`
//!   first and `Vec<u8>` second.
//! - `DECIMAL` has no `Any` mapping; prices are `DOUBLE` / `REAL`.
//! - SQLite `LIKE` folds ASCII case only. Cyrillic substring matches are
//!   case-sensitive there; MySQL's `_ci` collations fold them.

use std::collections::HashMap;
use std::sync::Once;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row};
use tracing::{debug, info};

use super::traits::{CatalogStore, StorageError};
use crate::catalog::sql_translator::{placeholders, CatalogSqlTranslator, SqlParam};
use crate::catalog::CatalogQuery;
use crate::config::SearchField;
use crate::metrics;
use crate::model::{Candidate, Category, Complect, Product, ProductId, Review};
use crate::resilience::retry::{retry, RetryConfig, Transient};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        header TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        price REAL NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS categories (id INTEGER PRIMARY KEY, title TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS complects (id INTEGER PRIMARY KEY, title TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS categories_products (
        category_id INTEGER NOT NULL,
        product_id INTEGER NOT NULL,
        UNIQUE (category_id, product_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_complects (
        product_id INTEGER NOT NULL,
        complect_id INTEGER NOT NULL,
        UNIQUE (product_id, complect_id)
    )",
    "CREATE TABLE IF NOT EXISTS products_tags (
        product_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        UNIQUE (product_id, tag_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_scopes (
        product_id INTEGER NOT NULL,
        scope TEXT NOT NULL,
        UNIQUE (product_id, scope)
    )",
    "CREATE TABLE IF NOT EXISTS smiles (
        id INTEGER PRIMARY KEY,
        created_at INTEGER NOT NULL DEFAULT 0,
        json_order TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS idx_products_title ON products (title)",
    "CREATE INDEX IF NOT EXISTS idx_products_header ON products (header)",
    "CREATE INDEX IF NOT EXISTS idx_categories_title ON categories (title)",
    "CREATE INDEX IF NOT EXISTS idx_categories_products_product ON categories_products (product_id, category_id)",
    "CREATE INDEX IF NOT EXISTS idx_smiles_json_order ON smiles (json_order)",
    "CREATE INDEX IF NOT EXISTS idx_smiles_created_at ON smiles (created_at)",
];

const MYSQL_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
        id BIGINT PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        header VARCHAR(255) NOT NULL DEFAULT '',
        description TEXT,
        price DOUBLE NOT NULL DEFAULT 0,
        created_at BIGINT NOT NULL DEFAULT 0,
        INDEX idx_products_title (title),
        INDEX idx_products_header (header)
    )",
    "CREATE TABLE IF NOT EXISTS categories (
        id BIGINT PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        INDEX idx_categories_title (title)
    )",
    "CREATE TABLE IF NOT EXISTS complects (id BIGINT PRIMARY KEY, title VARCHAR(255) NOT NULL)",
    "CREATE TABLE IF NOT EXISTS categories_products (
        category_id BIGINT NOT NULL,
        product_id BIGINT NOT NULL,
        UNIQUE KEY uq_categories_products (category_id, product_id),
        INDEX idx_categories_products_product (product_id, category_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_complects (
        product_id BIGINT NOT NULL,
        complect_id BIGINT NOT NULL,
        UNIQUE KEY uq_product_complects (product_id, complect_id)
    )",
    "CREATE TABLE IF NOT EXISTS products_tags (
        product_id BIGINT NOT NULL,
        tag_id BIGINT NOT NULL,
        UNIQUE KEY uq_products_tags (product_id, tag_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_scopes (
        product_id BIGINT NOT NULL,
        scope VARCHAR(64) NOT NULL,
        UNIQUE KEY uq_product_scopes (product_id, scope)
    )",
    "CREATE TABLE IF NOT EXISTS smiles (
        id BIGINT PRIMARY KEY,
        created_at BIGINT NOT NULL DEFAULT 0,
        json_order LONGTEXT,
        INDEX idx_smiles_json_order (json_order(255)),
        INDEX idx_smiles_created_at (created_at)
    )",
];

const PRODUCT_COLUMNS: &str = "p.id, p.title, p.header, p.description, p.price, p.created_at";

type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

fn map_err(e: sqlx::Error) -> StorageError {
    if e.is_transient() {
        metrics::record_connection_error("sql");
        StorageError::Unavailable(e.to_string())
    } else {
        StorageError::Backend(e.to_string())
    }
}

fn bind_all<'q>(mut query: AnyQuery<'q>, params: &[SqlParam]) -> AnyQuery<'q> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.clone()),
            SqlParam::Integer(n) => query.bind(*n),
            SqlParam::Numeric(n) => query.bind(*n),
        };
    }
    query
}

fn bind_ids<'q>(mut query: AnyQuery<'q>, ids: &[i64]) -> AnyQuery<'q> {
    for id in ids {
        query = query.bind(*id);
    }
    query
}

fn sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `%text%` with LIKE wildcards in `text` escaped by backslash
fn like_contains(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

// Try String first (SQLite TEXT), then bytes (MySQL TEXT)
fn read_text(row: &AnyRow, table: &'static str, column: &str) -> Result<String, StorageError> {
    if let Ok(text) = row.try_get::<String, _>(column) {
        return Ok(text);
    }
    match row.try_get::<Option<Vec<u8>>, _>(column) {
        Ok(Some(bytes)) => String::from_utf8(bytes).map_err(|e| StorageError::Corruption {
            table,
            detail: format!("{}: {}", column, e),
        }),
        Ok(None) => Ok(String::new()),
        Err(e) => Err(StorageError::Corruption {
            table,
            detail: format!("{}: {}", column, e),
        }),
    }
}

fn read_int(row: &AnyRow, table: &'static str, column: &str) -> Result<i64, StorageError> {
    row.try_get::<i64, _>(column).map_err(|e| StorageError::Corruption {
        table,
        detail: format!("{}: {}", column, e),
    })
}

fn read_product(row: &AnyRow) -> Result<Product, StorageError> {
    let price = row
        .try_get::<f64, _>("price")
        .or_else(|_| row.try_get::<i64, _>("price").map(|p| p as f64))
        .map_err(|e| StorageError::Corruption {
            table: "products",
            detail: format!("price: {}", e),
        })?;

    Ok(Product::new(read_int(row, "products", "id")?, read_text(row, "products", "title")?)
        .with_header(read_text(row, "products", "header")?)
        .with_description(read_text(row, "products", "description")?)
        .with_price(price)
        .with_created_at(read_int(row, "products", "created_at")?))
}

fn read_review(row: &AnyRow) -> Result<Review, StorageError> {
    Ok(Review::new(
        read_int(row, "smiles", "id")?,
        read_int(row, "smiles", "created_at")?,
        read_text(row, "smiles", "json_order")?,
    ))
}

pub struct SqlCatalogStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlCatalogStore {
    /// Connect with startup-mode retry (fails fast if config is wrong) and
    /// create the schema.
    pub async fn connect(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();
        let started = Instant::now();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = retry("sql_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(if is_sqlite { 1 } else { 20 })
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(connection_string)
                .await
                .map_err(map_err)
        })
        .await?;
        metrics::record_startup_phase("sql_connect", started.elapsed());

        let store = Self { pool, is_sqlite };

        if is_sqlite {
            store.enable_wal_mode().await?;
        }

        store.init_schema().await?;
        info!(sqlite = is_sqlite, "Catalog store ready");
        Ok(store)
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let started = Instant::now();
        let statements = if self.is_sqlite { SQLITE_SCHEMA } else { MYSQL_SCHEMA };

        for sql in statements {
            retry("sql_init_schema", &RetryConfig::startup(), || async {
                sqlx::query(sql).execute(&self.pool).await.map_err(map_err)
            })
            .await?;
        }

        metrics::record_startup_phase("sql_schema", started.elapsed());
        Ok(())
    }

    /// SQLite has no default LIKE escape character; MySQL uses backslash.
    fn like_escape(&self) -> &'static str {
        if self.is_sqlite {
            " ESCAPE '\\'"
        } else {
            ""
        }
    }

    /// Character length function (MySQL `LENGTH` counts bytes)
    fn char_length(&self) -> &'static str {
        if self.is_sqlite {
            "LENGTH"
        } else {
            "CHAR_LENGTH"
        }
    }

    fn insert_ignore(&self) -> &'static str {
        if self.is_sqlite {
            "INSERT OR IGNORE"
        } else {
            "INSERT IGNORE"
        }
    }

    fn upsert_title_sql(&self, table: &str) -> String {
        if self.is_sqlite {
            format!("INSERT INTO {table} (id, title) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET title = excluded.title")
        } else {
            format!("INSERT INTO {table} (id, title) VALUES (?, ?) ON DUPLICATE KEY UPDATE title = VALUES(title)")
        }
    }

    async fn fetch_products(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Product>, StorageError> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        let mut products = rows.iter().map(read_product).collect::<Result<Vec<_>, _>>()?;
        self.load_relations(&mut products).await?;
        Ok(products)
    }

    async fn fetch_reviews(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Review>, StorageError> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter().map(read_review).collect()
    }

    /// Populate categories, complects, tags and scopes for a page of products
    /// with one batched query per relation table.
    async fn load_relations(&self, products: &mut [Product]) -> Result<(), StorageError> {
        if products.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let position: HashMap<ProductId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let marks = placeholders(ids.len());

        let sql = format!(
            "SELECT cp.product_id AS product_id, c.id AS rel_id, c.title AS rel_title \
             FROM categories_products cp JOIN categories c ON c.id = cp.category_id \
             WHERE cp.product_id IN ({marks}) ORDER BY c.id"
        );
        for row in bind_ids(sqlx::query(&sql), &ids).fetch_all(&self.pool).await.map_err(map_err)? {
            let product_id = read_int(&row, "categories_products", "product_id")?;
            if let Some(&i) = position.get(&product_id) {
                products[i].categories.push(Category::new(
                    read_int(&row, "categories", "rel_id")?,
                    read_text(&row, "categories", "rel_title")?,
                ));
            }
        }

        let sql = format!(
            "SELECT pc.product_id AS product_id, c.id AS rel_id, c.title AS rel_title \
             FROM product_complects pc JOIN complects c ON c.id = pc.complect_id \
             WHERE pc.product_id IN ({marks}) ORDER BY c.id"
        );
        for row in bind_ids(sqlx::query(&sql), &ids).fetch_all(&self.pool).await.map_err(map_err)? {
            let product_id = read_int(&row, "product_complects", "product_id")?;
            if let Some(&i) = position.get(&product_id) {
                products[i].complects.push(Complect::new(
                    read_int(&row, "complects", "rel_id")?,
                    read_text(&row, "complects", "rel_title")?,
                ));
            }
        }

        let sql = format!("SELECT product_id, tag_id FROM products_tags WHERE product_id IN ({marks}) ORDER BY tag_id");
        for row in bind_ids(sqlx::query(&sql), &ids).fetch_all(&self.pool).await.map_err(map_err)? {
            let product_id = read_int(&row, "products_tags", "product_id")?;
            if let Some(&i) = position.get(&product_id) {
                products[i].tag_ids.push(read_int(&row, "products_tags", "tag_id")?);
            }
        }

        let sql = format!("SELECT product_id, scope FROM product_scopes WHERE product_id IN ({marks}) ORDER BY scope");
        for row in bind_ids(sqlx::query(&sql), &ids).fetch_all(&self.pool).await.map_err(map_err)? {
            let product_id = read_int(&row, "product_scopes", "product_id")?;
            if let Some(&i) = position.get(&product_id) {
                products[i].scopes.push(read_text(&row, "product_scopes", "scope")?);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SqlCatalogStore {
    async fn find_products_containing(&self, text: &str, limit: usize) -> Result<Vec<Product>, StorageError> {
        let esc = self.like_escape();
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p \
             WHERE p.title LIKE ?{esc} OR p.header LIKE ?{esc} ORDER BY p.id LIMIT ?"
        );
        let pattern = like_contains(text);
        self.fetch_products(
            &sql,
            &[
                SqlParam::Text(pattern.clone()),
                SqlParam::Text(pattern),
                SqlParam::Integer(sql_int(limit)),
            ],
        )
        .await
    }

    async fn candidates_by_length(
        &self,
        field: SearchField,
        min_chars: usize,
        max_chars: usize,
        limit: usize,
    ) -> Result<Vec<Candidate>, StorageError> {
        let column = field.column();
        let sql = format!(
            "SELECT id, {column} AS text FROM products \
             WHERE {len}({column}) BETWEEN ? AND ? ORDER BY id LIMIT ?",
            len = self.char_length()
        );
        let rows = sqlx::query(&sql)
            .bind(sql_int(min_chars))
            .bind(sql_int(max_chars))
            .bind(sql_int(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        rows.iter()
            .map(|row| {
                Ok(Candidate {
                    id: read_int(row, "products", "id")?,
                    text: read_text(row, "products", "text")?,
                })
            })
            .collect()
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id IN ({})",
            placeholders(ids.len())
        );
        let params: Vec<SqlParam> = ids.iter().map(|id| SqlParam::Integer(*id)).collect();
        self.fetch_products(&sql, &params).await
    }

    async fn list_products(&self, query: &CatalogQuery) -> Result<Vec<Product>, StorageError> {
        let mut filter = CatalogSqlTranslator::translate(query);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            filter.clause,
            query.sort.order_by_sql()
        );
        filter.params.push(SqlParam::Integer(sql_int(query.limit)));
        filter.params.push(SqlParam::Integer(sql_int(query.offset)));

        debug!(sql = %sql, "Listing products");
        self.fetch_products(&sql, &filter.params).await
    }

    async fn count_products(&self, query: &CatalogQuery) -> Result<u64, StorageError> {
        let filter = CatalogSqlTranslator::translate(query);
        let sql = format!("SELECT COUNT(*) AS cnt FROM products p WHERE {}", filter.clause);
        let row = bind_all(sqlx::query(&sql), &filter.params)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(read_int(&row, "products", "cnt")?.max(0) as u64)
    }

    async fn admin_products(
        &self,
        category_ids: &[i64],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StorageError> {
        let mut filter = CatalogSqlTranslator::translate_admin(category_ids);
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE {} ORDER BY p.id DESC LIMIT ? OFFSET ?",
            filter.clause
        );
        filter.params.push(SqlParam::Integer(sql_int(limit)));
        filter.params.push(SqlParam::Integer(sql_int(offset)));
        self.fetch_products(&sql, &filter.params).await
    }

    async fn categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows = sqlx::query("SELECT id, title FROM categories ORDER BY title, id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(Category::new(
                    read_int(row, "categories", "id")?,
                    read_text(row, "categories", "title")?,
                ))
            })
            .collect()
    }

    async fn complects(&self) -> Result<Vec<Complect>, StorageError> {
        let rows = sqlx::query("SELECT id, title FROM complects ORDER BY title, id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
        rows.iter()
            .map(|row| {
                Ok(Complect::new(
                    read_int(row, "complects", "id")?,
                    read_text(row, "complects", "title")?,
                ))
            })
            .collect()
    }

    async fn reviews_matching(
        &self,
        token: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Review>, StorageError> {
        // Token match is exact: binary collation on MySQL
        let predicate = if self.is_sqlite {
            format!("json_order LIKE ?{}", self.like_escape())
        } else {
            "json_order LIKE ? COLLATE utf8mb4_bin".to_string()
        };
        let sql = format!(
            "SELECT id, created_at, json_order FROM smiles WHERE {predicate} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        self.fetch_reviews(
            &sql,
            &[
                SqlParam::Text(like_contains(token)),
                SqlParam::Integer(limit.map_or(i64::MAX, sql_int)),
                SqlParam::Integer(sql_int(offset)),
            ],
        )
        .await
    }

    async fn latest_reviews(&self, offset: usize, limit: usize) -> Result<Vec<Review>, StorageError> {
        self.fetch_reviews(
            "SELECT id, created_at, json_order FROM smiles ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            &[SqlParam::Integer(sql_int(limit)), SqlParam::Integer(sql_int(offset))],
        )
        .await
    }

    async fn search_reviews(&self, text: &str, limit: usize) -> Result<Vec<Review>, StorageError> {
        let sql = format!(
            "SELECT id, created_at, json_order FROM smiles WHERE json_order LIKE ?{} \
             ORDER BY created_at DESC, id DESC LIMIT ?",
            self.like_escape()
        );
        self.fetch_reviews(
            &sql,
            &[SqlParam::Text(like_contains(text)), SqlParam::Integer(sql_int(limit))],
        )
        .await
    }

    async fn put_product(&self, product: &Product) -> Result<(), StorageError> {
        let upsert = if self.is_sqlite {
            "INSERT INTO products (id, title, header, description, price, created_at) VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                title = excluded.title, \
                header = excluded.header, \
                description = excluded.description, \
                price = excluded.price, \
                created_at = excluded.created_at"
        } else {
            "INSERT INTO products (id, title, header, description, price, created_at) VALUES (?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                title = VALUES(title), \
                header = VALUES(header), \
                description = VALUES(description), \
                price = VALUES(price), \
                created_at = VALUES(created_at)"
        };

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        sqlx::query(upsert)
            .bind(product.id)
            .bind(product.title.clone())
            .bind(product.header.clone())
            .bind(product.description.clone())
            .bind(product.price)
            .bind(product.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        for table in ["categories_products", "product_complects", "products_tags", "product_scopes"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE product_id = ?"))
                .bind(product.id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        // Referenced categories/complects are created if absent, never renamed
        for category in &product.categories {
            sqlx::query(&format!("{} INTO categories (id, title) VALUES (?, ?)", self.insert_ignore()))
                .bind(category.id)
                .bind(category.title.clone())
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            sqlx::query(&format!(
                "{} INTO categories_products (category_id, product_id) VALUES (?, ?)",
                self.insert_ignore()
            ))
            .bind(category.id)
            .bind(product.id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        for complect in &product.complects {
            sqlx::query(&format!("{} INTO complects (id, title) VALUES (?, ?)", self.insert_ignore()))
                .bind(complect.id)
                .bind(complect.title.clone())
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            sqlx::query(&format!(
                "{} INTO product_complects (product_id, complect_id) VALUES (?, ?)",
                self.insert_ignore()
            ))
            .bind(product.id)
            .bind(complect.id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        for tag_id in &product.tag_ids {
            sqlx::query(&format!(
                "{} INTO products_tags (product_id, tag_id) VALUES (?, ?)",
                self.insert_ignore()
            ))
            .bind(product.id)
            .bind(*tag_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        for scope in &product.scopes {
            sqlx::query(&format!(
                "{} INTO product_scopes (product_id, scope) VALUES (?, ?)",
                self.insert_ignore()
            ))
            .bind(product.id)
            .bind(scope.clone())
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        for table in ["categories_products", "product_complects", "products_tags", "product_scopes"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE product_id = ?"))
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
        }

        let deleted = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?
            .rows_affected();

        if deleted == 0 {
            // Dropping the transaction rolls back
            return Err(StorageError::NotFound { entity: "product", id });
        }

        tx.commit().await.map_err(map_err)?;
        Ok(())
    }

    async fn put_category(&self, category: &Category) -> Result<(), StorageError> {
        sqlx::query(&self.upsert_title_sql("categories"))
            .bind(category.id)
            .bind(category.title.clone())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn put_complect(&self, complect: &Complect) -> Result<(), StorageError> {
        sqlx::query(&self.upsert_title_sql("complects"))
            .bind(complect.id)
            .bind(complect.title.clone())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn put_review(&self, review: &Review) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            "INSERT INTO smiles (id, created_at, json_order) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET created_at = excluded.created_at, json_order = excluded.json_order"
        } else {
            "INSERT INTO smiles (id, created_at, json_order) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE created_at = VALUES(created_at), json_order = VALUES(json_order)"
        };
        sqlx::query(sql)
            .bind(review.id)
            .bind(review.created_at)
            .bind(review.payload.clone())
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}
