//! Per-indexer circuit breaker.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

use super::rate_limiter::RateLimitStatus;
use crate::metrics;

/// Health counters owned by one indexer.
///
/// Overlapping searches on the same indexer may update these concurrently,
/// so every field is atomic.
#[derive(Debug)]
pub struct IndexerHealth {
    name: String,
    max_consecutive_errors: u32,
    error_count: AtomicU32,
    enabled: AtomicBool,
    /// Unix millis, 0 when never.
    last_check: AtomicI64,
    last_search: AtomicI64,
    last_error: Mutex<Option<String>>,
}

impl IndexerHealth {
    pub fn new(name: impl Into<String>, max_consecutive_errors: u32) -> Self {
        Self {
            name: name.into(),
            max_consecutive_errors: max_consecutive_errors.max(1),
            error_count: AtomicU32::new(0),
            enabled: AtomicBool::new(true),
            last_check: AtomicI64::new(0),
            last_search: AtomicI64::new(0),
            last_error: Mutex::new(None),
        }
    }

    /// Count one failure; disables the indexer once the threshold is reached.
    pub fn record_error(&self, error: impl Into<String>) {
        let count = self.error_count.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error.into());

        if count >= self.max_consecutive_errors && self.enabled.swap(false, Ordering::SeqCst) {
            warn!(
                indexer = %self.name,
                errors = count,
                "Indexer disabled after consecutive errors"
            );
            metrics::INDEXER_DISABLED
                .with_label_values(&[self.name.as_str()])
                .inc();
        }
    }

    /// Clear the error streak and re-enable the indexer.
    pub fn reset_errors(&self) {
        self.error_count.store(0, Ordering::SeqCst);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!(indexer = %self.name, "Indexer re-enabled");
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
            && self.error_count.load(Ordering::SeqCst) < self.max_consecutive_errors
    }

    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn mark_checked(&self) {
        self.last_check.store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    pub fn mark_searched(&self) {
        self.last_search.store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.last_check.load(Ordering::SeqCst))
    }

    pub fn last_search(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.last_search.load(Ordering::SeqCst))
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn max_consecutive_errors(&self) -> u32 {
        self.max_consecutive_errors
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        None
    } else {
        DateTime::from_timestamp_millis(ms)
    }
}

/// Whether the site needs credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerAccess {
    Public,
    Private,
}

/// Read-only snapshot of an indexer's state.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerStatus {
    pub name: String,
    pub access: IndexerAccess,
    pub healthy: bool,
    pub enabled: bool,
    pub error_count: u32,
    pub max_consecutive_errors: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_search: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitStatus>,
}

impl IndexerStatus {
    pub fn from_health(name: &str, access: IndexerAccess, health: &IndexerHealth) -> Self {
        Self {
            name: name.to_string(),
            access,
            healthy: health.is_healthy(),
            enabled: health.is_enabled(),
            error_count: health.error_count(),
            max_consecutive_errors: health.max_consecutive_errors(),
            last_check: health.last_check(),
            last_search: health.last_search(),
            last_error: health.last_error(),
            rate_limit: None,
        }
    }
}
