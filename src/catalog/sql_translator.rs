// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQL Translator
//!
//! Translates a [`CatalogQuery`] into a parameterized WHERE clause over the
//! `products p` alias. Relation filters become correlated `EXISTS`
//! subqueries, so a product linked to several requested categories still
//! appears once and no GROUP BY is needed.
//!
//! # SQL Syntax Generated
//!
//! ```sql
//! (NOT EXISTS (SELECT 1 FROM product_scopes ps WHERE ps.product_id = p.id)
//!    OR EXISTS (SELECT 1 FROM product_scopes ps WHERE ps.product_id = p.id AND ps.scope = ?))
//! EXISTS (SELECT 1 FROM categories_products cp WHERE cp.product_id = p.id AND cp.category_id IN (?, ?))
//! p.price BETWEEN ? AND ?
//! ```

use super::query::CatalogQuery;

/// Catalog query translator
pub struct CatalogSqlTranslator;

/// SQL query result with parameterized placeholders
#[derive(Debug, Clone)]
pub struct SqlQuery {
    /// The WHERE clause (without "WHERE" keyword)
    pub clause: String,
    /// The parameter values in order
    pub params: Vec<SqlParam>,
}

/// SQL parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Numeric(f64),
}

impl CatalogSqlTranslator {
    /// Translate the filters of `query` (pagination and sort excluded).
    ///
    /// Uses `?` placeholders, accepted by both SQLite and MySQL.
    pub fn translate(query: &CatalogQuery) -> SqlQuery {
        let mut params = Vec::new();
        let mut parts = Vec::new();

        params.push(SqlParam::Text(query.scope.clone()));
        parts.push(
            "(NOT EXISTS (SELECT 1 FROM product_scopes ps WHERE ps.product_id = p.id) \
             OR EXISTS (SELECT 1 FROM product_scopes ps WHERE ps.product_id = p.id AND ps.scope = ?))"
                .to_string(),
        );

        if let Some(part) = Self::any_of("categories_products", "category_id", &query.category_ids, &mut params) {
            parts.push(part);
        }
        if let Some(part) = Self::any_of("product_complects", "complect_id", &query.complect_ids, &mut params) {
            parts.push(part);
        }
        if let Some(part) = Self::any_of("products_tags", "tag_id", &query.tag_ids, &mut params) {
            parts.push(part);
        }

        match (query.price_min, query.price_max) {
            (Some(min), Some(max)) => {
                params.push(SqlParam::Numeric(min));
                params.push(SqlParam::Numeric(max));
                parts.push("p.price BETWEEN ? AND ?".to_string());
            }
            (Some(min), None) => {
                params.push(SqlParam::Numeric(min));
                parts.push("p.price >= ?".to_string());
            }
            (None, Some(max)) => {
                params.push(SqlParam::Numeric(max));
                parts.push("p.price <= ?".to_string());
            }
            (None, None) => {}
        }

        SqlQuery {
            clause: parts.join(" AND "),
            params,
        }
    }

    /// WHERE clause for the admin listing: optionally ANY of `category_ids`.
    pub fn translate_admin(category_ids: &[i64]) -> SqlQuery {
        let mut params = Vec::new();
        let clause = Self::any_of("categories_products", "category_id", category_ids, &mut params)
            .unwrap_or_else(|| "1=1".to_string());
        SqlQuery { clause, params }
    }

    /// Render with inline values.
    ///
    /// Warning: Only use for debugging, not for actual queries (SQL injection risk)
    pub fn translate_inline(query: &CatalogQuery) -> String {
        let translated = Self::translate(query);
        let mut result = translated.clause;
        for param in translated.params {
            let value = match param {
                SqlParam::Text(s) => format!("'{}'", s.replace('\'', "''")),
                SqlParam::Integer(n) => n.to_string(),
                SqlParam::Numeric(n) => n.to_string(),
            };
            result = result.replacen('?', &value, 1);
        }
        result
    }

    fn any_of(table: &str, column: &str, ids: &[i64], params: &mut Vec<SqlParam>) -> Option<String> {
        if ids.is_empty() {
            return None;
        }
        params.extend(ids.iter().map(|id| SqlParam::Integer(*id)));
        Some(format!(
            "EXISTS (SELECT 1 FROM {table} r WHERE r.product_id = p.id AND r.{column} IN ({}))",
            placeholders(ids.len())
        ))
    }
}

/// `?, ?, ?` for `n` parameters
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_only() {
        let sql = CatalogSqlTranslator::translate(&CatalogQuery::new("msk"));
        assert!(sql.clause.starts_with("(NOT EXISTS"));
        assert_eq!(sql.params, vec![SqlParam::Text("msk".into())]);
    }

    #[test]
    fn test_relation_filters_use_exists_with_in_list() {
        let query = CatalogQuery::new("msk").categories(vec![3, 7]).tags(vec![11]);
        let sql = CatalogSqlTranslator::translate(&query);

        assert!(sql
            .clause
            .contains("EXISTS (SELECT 1 FROM categories_products r WHERE r.product_id = p.id AND r.category_id IN (?, ?))"));
        assert!(sql.clause.contains("r.tag_id IN (?)"));
        assert!(!sql.clause.contains("product_complects"));
        assert_eq!(
            sql.params,
            vec![
                SqlParam::Text("msk".into()),
                SqlParam::Integer(3),
                SqlParam::Integer(7),
                SqlParam::Integer(11),
            ]
        );
    }

    #[test]
    fn test_price_bounds() {
        let both = CatalogSqlTranslator::translate(&CatalogQuery::new("a").price_range(Some(100.0), Some(200.0)));
        assert!(both.clause.ends_with("p.price BETWEEN ? AND ?"));

        let min = CatalogSqlTranslator::translate(&CatalogQuery::new("a").price_range(Some(100.0), None));
        assert!(min.clause.ends_with("p.price >= ?"));
        assert_eq!(min.params.last(), Some(&SqlParam::Numeric(100.0)));

        let max = CatalogSqlTranslator::translate(&CatalogQuery::new("a").price_range(None, Some(5.0)));
        assert!(max.clause.ends_with("p.price <= ?"));
    }

    #[test]
    fn test_admin_without_categories_matches_all() {
        let sql = CatalogSqlTranslator::translate_admin(&[]);
        assert_eq!(sql.clause, "1=1");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_inline_escapes_quotes() {
        let inline = CatalogSqlTranslator::translate_inline(&CatalogQuery::new("o'hara").categories(vec![2]));
        assert!(inline.contains("ps.scope = 'o''hara'"));
        assert!(inline.contains("IN (2)"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
