// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use crate::model::ProductId;

/// A product write that happened outside this engine (another process,
/// an admin tool) and whose cache entries must be dropped here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductMutation {
    Saved(ProductId),
    Deleted(ProductId),
}

impl ProductMutation {
    #[must_use]
    pub fn product_id(&self) -> ProductId {
        match self {
            Self::Saved(id) | Self::Deleted(id) => *id,
        }
    }

    /// Metric label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Saved(_) => "save",
            Self::Deleted(_) => "delete",
        }
    }
}

/// Receiver of product change notifications.
///
/// Invalidation is synchronous: when `on_product_mutation` returns, no read
/// through the listener's cache can observe the pre-mutation entries.
pub trait ProductMutationListener: Send + Sync {
    /// Returns the number of cache entries dropped
    fn on_product_mutation(&self, mutation: ProductMutation) -> usize;
}
