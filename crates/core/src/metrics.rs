//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Indexers (search outcomes, latency, circuit breaker trips)
//! - Search fan-out (results per search)
//! - Rules and decisions (security filter removals, decision outcomes)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Indexers
// =============================================================================

/// Indexer searches by outcome.
pub static INDEXER_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trackhub_indexer_searches_total", "Total indexer searches"),
        &["indexer", "outcome"], // "success", "error", "timeout", "skipped"
    )
    .unwrap()
});

/// Indexer search duration in seconds.
pub static INDEXER_SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trackhub_indexer_search_duration_seconds",
            "Duration of a single indexer search",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["indexer"],
    )
    .unwrap()
});

/// Times an indexer was disabled after too many consecutive errors.
pub static INDEXER_DISABLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trackhub_indexer_disabled_total",
            "Times an indexer hit its consecutive error threshold",
        ),
        &["indexer"],
    )
    .unwrap()
});

// =============================================================================
// Search fan-out
// =============================================================================

/// Results returned per fan-out search.
pub static SEARCH_RESULTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "trackhub_search_results",
            "Number of results returned per search_all call",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
    )
    .unwrap()
});

// =============================================================================
// Rules and decisions
// =============================================================================

/// Results removed by the security policy filter.
pub static SECURITY_FILTERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trackhub_security_filtered_total",
            "Results removed by the security policy filter",
        ),
        &["rule"], // "hr", "h3h5", "free_only"
    )
    .unwrap()
});

/// Decisions by outcome and reason.
pub static DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trackhub_decisions_total", "Download decisions made"),
        &["outcome", "reason"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(INDEXER_SEARCHES.clone()),
        Box::new(INDEXER_SEARCH_DURATION.clone()),
        Box::new(INDEXER_DISABLED.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(SECURITY_FILTERED.clone()),
        Box::new(DECISIONS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        INDEXER_SEARCHES.with_label_values(&["t", "success"]).inc();
        assert!(!registry.gather().is_empty());
    }
}
