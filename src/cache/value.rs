// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Values the engine keeps in its shared cache.
//!
//! One [`CacheAside`] instance holds every family of keys (search, catalog,
//! reviews, reference lists) so a single `invalidate_matching` call can reach
//! all of them. Values are `Arc`ed so a hit is a pointer copy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::store::CacheAside;
use crate::model::{Category, Complect, Product, Review};
use crate::storage::traits::StorageError;

#[derive(Debug, Clone)]
pub enum CachedValue {
    Products(Arc<Vec<Product>>),
    Reviews(Arc<Vec<Review>>),
    Categories(Arc<Vec<Category>>),
    Complects(Arc<Vec<Complect>>),
}

/// Conversion between a computed result and its cached form.
pub trait Cacheable: Sized {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

macro_rules! cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for Arc<Vec<$ty>> {
            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(value: CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

cacheable!(Product, Products);
cacheable!(Review, Reviews);
cacheable!(Category, Categories);
cacheable!(Complect, Complects);

impl CacheAside<CachedValue> {
    /// Typed [`get_or_compute`](CacheAside::get_or_compute).
    ///
    /// A key holding a value of another type is treated as a miss: it is
    /// dropped and `producer` runs uncached.
    pub async fn cached<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, StorageError>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut slot = Some(producer);

        let value = self
            .get_or_compute(key, ttl, || {
                let producer = slot.take();
                async move {
                    match producer {
                        Some(produce) => produce().await.map(T::into_cached),
                        None => Err(StorageError::Corruption {
                            table: "cache",
                            detail: "producer already consumed".to_string(),
                        }),
                    }
                }
            })
            .await?;

        if let Some(typed) = T::from_cached(value) {
            return Ok(typed);
        }

        warn!(key = %key, "Cached value has unexpected type, recomputing");
        self.invalidate(key);
        match slot.take() {
            Some(produce) => produce().await,
            None => Err(StorageError::Corruption {
                table: "cache",
                detail: format!("type mismatch for key '{}'", key),
            }),
        }
    }
}
