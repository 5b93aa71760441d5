// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for catalog-engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `catalog_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `component`: search, catalog, reviews, admin, store
//! - `operation`: fuzzy_search, list_catalog, product_reviews, ...
//! - `outcome`: hit, miss, expired, coalesced, bypass
//!
//! # Slow operations
//!
//! A [`LatencyTimer`] may carry a threshold. When the timed scope outlives
//! it, the timer logs a `warn!` with the elapsed time and bumps
//! `catalog_engine_slow_operations_total`.

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};
use tracing::warn;

/// Record a completed engine operation
pub fn record_operation(component: &str, operation: &str, status: &str) {
    counter!(
        "catalog_engine_operations_total",
        "component" => component.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(component: &str, operation: &str, duration: Duration) {
    histogram!(
        "catalog_engine_operation_seconds",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record an operation that exceeded its slow threshold
pub fn record_slow_operation(component: &str, operation: &str) {
    counter!(
        "catalog_engine_slow_operations_total",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache lookup outcome (hit, miss, expired, coalesced, bypass)
pub fn record_cache_lookup(outcome: &str) {
    counter!(
        "catalog_engine_cache_lookups_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record entries removed by one invalidation call
pub fn record_cache_invalidation(removed: usize) {
    counter!("catalog_engine_cache_invalidations_total").increment(1);
    counter!("catalog_engine_cache_invalidated_entries_total").increment(removed as u64);
}

/// Set current cache entry count
pub fn set_cache_entries(count: usize) {
    gauge!("catalog_engine_cache_entries").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// SEARCH
// ═══════════════════════════════════════════════════════════════════════════

/// Record which phase answered a search (substring, fuzzy, rejected)
pub fn record_search_phase(phase: &str) {
    counter!(
        "catalog_engine_search_queries_total",
        "phase" => phase.to_string()
    )
    .increment(1);
}

/// Record how many candidates the fuzzy phase scored
pub fn record_search_candidates(count: usize) {
    histogram!("catalog_engine_search_candidates").record(count as f64);
}

/// Record result count
pub fn record_search_results(count: usize) {
    histogram!("catalog_engine_search_results").record(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(component: &str, operation: &str, error_type: &str) {
    counter!(
        "catalog_engine_errors_total",
        "component" => component.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a connection/backend error
pub fn record_connection_error(backend: &str) {
    counter!(
        "catalog_engine_connection_errors_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

/// Record a product write and the cache entries it invalidated
pub fn record_product_write(kind: &str, invalidated: usize) {
    counter!(
        "catalog_engine_product_writes_total",
        "kind" => kind.to_string()
    )
    .increment(1);
    histogram!("catalog_engine_write_invalidated_entries").record(invalidated as f64);
}

/// Record startup phase duration
pub fn record_startup_phase(phase: &str, duration: Duration) {
    histogram!(
        "catalog_engine_startup_seconds",
        "phase" => phase.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    component: &'static str,
    operation: &'static str,
    start: Instant,
    slow_after: Option<Duration>,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            start: Instant::now(),
            slow_after: None,
        }
    }

    /// Warn when the timed scope takes longer than `threshold`
    #[must_use]
    pub fn slow_after(mut self, threshold: Duration) -> Self {
        self.slow_after = Some(threshold);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        record_latency(self.component, self.operation, elapsed);

        if let Some(threshold) = self.slow_after {
            if elapsed > threshold {
                record_slow_operation(self.component, self.operation);
                warn!(
                    component = self.component,
                    operation = self.operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = threshold.as_millis() as u64,
                    "Slow operation"
                );
            }
        }
    }
}

/// Convenience macro for timing operations
#[macro_export]
macro_rules! time_operation {
    ($component:expr, $op:expr) => {
        $crate::metrics::LatencyTimer::new($component, $op)
    };
    ($component:expr, $op:expr, slow_after = $threshold:expr) => {
        $crate::metrics::LatencyTimer::new($component, $op).slow_after($threshold)
    };
}
