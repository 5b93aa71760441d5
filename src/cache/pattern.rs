// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Key patterns for targeted invalidation.
//!
//! Patterns are globs (`*`, `?`, `[..]`) matched against any suffix of the
//! key, so `product_42_*` drops `product_42_page_1` and also
//! `smiles_product_42_all`, but never `product_142_page_1`. A pattern without
//! wildcards must equal the key or one of its suffixes.

use glob::Pattern;

#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    glob: Option<Pattern>,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Self {
        // An unparsable glob degrades to a literal suffix match
        let glob = Pattern::new(&format!("*{}", pattern)).ok();
        Self {
            raw: pattern.to_string(),
            glob,
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match &self.glob {
            Some(glob) => glob.matches(key),
            None => key.ends_with(&self.raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}
