// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Candidate pre-filter for the fuzzy phase.
//!
//! Narrows the product table to records whose scored field has a length
//! close to the query's, capped at `max_candidates`. This is a best-effort
//! recall trade-off: a relevant product whose title is far shorter or longer
//! than the query is never scored.

use std::sync::Arc;

use crate::config::{CatalogEngineConfig, SearchField};
use crate::model::Candidate;
use crate::storage::traits::{CatalogStore, StorageError};

/// Inclusive character-length window around a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthWindow {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl LengthWindow {
    /// `[len − below, len + above]`, floored at zero
    pub fn around(query: &str, below: usize, above: usize) -> Self {
        let len = query.chars().count();
        Self {
            min_chars: len.saturating_sub(below),
            max_chars: len.saturating_add(above),
        }
    }

    pub fn contains(&self, text: &str) -> bool {
        (self.min_chars..=self.max_chars).contains(&text.chars().count())
    }
}

pub struct CandidateFilter {
    store: Arc<dyn CatalogStore>,
    field: SearchField,
    chars_below: usize,
    chars_above: usize,
    max_candidates: usize,
}

impl CandidateFilter {
    pub fn new(store: Arc<dyn CatalogStore>, config: &CatalogEngineConfig) -> Self {
        Self {
            store,
            field: config.search_field,
            chars_below: config.candidate_chars_below,
            chars_above: config.candidate_chars_above,
            max_candidates: config.max_candidates,
        }
    }

    pub fn window(&self, query: &str) -> LengthWindow {
        LengthWindow::around(query, self.chars_below, self.chars_above)
    }

    /// Id + text projections inside the query's length window.
    pub async fn candidates(&self, query: &str) -> Result<Vec<Candidate>, StorageError> {
        let window = self.window(query);
        self.store
            .candidates_by_length(self.field, window.min_chars, window.max_chars, self.max_candidates)
            .await
    }
}
