//! Concurrent fan-out of one search across indexers.

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::site_guard::SiteGuard;
use super::{SearchRequest, TorrentResult};
use crate::config::SearchConfig;
use crate::indexer::{Indexer, IndexerRegistry};
use crate::metrics;

const DEFAULT_PER_INDEXER_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SITE_GUARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Why an indexer was left out of a search.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedIndexer {
    pub name: String,
    pub reason: String,
}

/// Per-call accounting of a fan-out search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchReport {
    /// Concatenated results in dispatch order.
    pub results: Vec<TorrentResult>,
    /// Indexers a search was dispatched to.
    pub queried: Vec<String>,
    /// Indexers that contributed at least one result.
    pub responded: Vec<String>,
    pub skipped: Vec<SkippedIndexer>,
    pub timed_out: Vec<String>,
    /// Still running when the overall deadline expired.
    pub abandoned: Vec<String>,
    pub duration_ms: u64,
}

enum TaskOutcome {
    Completed(Vec<TorrentResult>),
    TimedOut,
    Failed,
}

/// Fans a search out to healthy indexers and collects partial results.
pub struct SearchOrchestrator {
    registry: Arc<IndexerRegistry>,
    site_guard: Option<Arc<dyn SiteGuard>>,
    site_guard_timeout: Duration,
    per_indexer_timeout: Duration,
    overall_timeout: Option<Duration>,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<IndexerRegistry>) -> Self {
        Self {
            registry,
            site_guard: None,
            site_guard_timeout: DEFAULT_SITE_GUARD_TIMEOUT,
            per_indexer_timeout: DEFAULT_PER_INDEXER_TIMEOUT,
            overall_timeout: None,
        }
    }

    pub fn from_config(registry: Arc<IndexerRegistry>, config: &SearchConfig) -> Self {
        Self::new(registry)
            .with_per_indexer_timeout(config.per_indexer_timeout())
            .with_overall_timeout(config.overall_timeout())
            .with_site_guard_timeout(config.site_guard_timeout())
    }

    pub fn with_site_guard(mut self, guard: Arc<dyn SiteGuard>) -> Self {
        self.site_guard = Some(guard);
        self
    }

    /// Budget for each site-guard check; a slower guard counts as "not blocked".
    pub fn with_site_guard_timeout(mut self, timeout: Duration) -> Self {
        self.site_guard_timeout = timeout;
        self
    }

    pub fn with_per_indexer_timeout(mut self, timeout: Duration) -> Self {
        self.per_indexer_timeout = timeout;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<IndexerRegistry> {
        &self.registry
    }

    /// Search with the configured per-indexer timeout.
    pub async fn search(&self, request: &SearchRequest) -> Vec<TorrentResult> {
        self.search_all(request, self.per_indexer_timeout).await
    }

    /// Search every eligible indexer concurrently and concatenate what comes
    /// back. Never fails; an empty candidate set yields an empty list.
    pub async fn search_all(
        &self,
        request: &SearchRequest,
        per_indexer_timeout: Duration,
    ) -> Vec<TorrentResult> {
        self.search_with_report(request, per_indexer_timeout)
            .await
            .results
    }

    pub async fn search_with_report(
        &self,
        request: &SearchRequest,
        per_indexer_timeout: Duration,
    ) -> SearchReport {
        let started = Instant::now();
        let mut report = SearchReport::default();

        let deadline = self.overall_timeout.map(|d| started + d);
        let candidates = self.candidates(request.indexer_names.as_deref()).await;
        let dispatch = self.apply_site_guard(candidates, deadline, &mut report).await;

        if dispatch.is_empty() {
            info!(query = %request.query, "No eligible indexers for search");
            report.duration_ms = started.elapsed().as_millis() as u64;
            return report;
        }

        let mut pending = FuturesUnordered::new();
        for (idx, indexer) in dispatch.iter().enumerate() {
            report.queried.push(indexer.name().to_string());
            let handle = tokio::spawn(run_one(
                Arc::clone(indexer),
                request.clone(),
                per_indexer_timeout,
            ));
            pending.push(async move { (idx, handle.await) });
        }

        let mut slots: Vec<Option<TaskOutcome>> = (0..dispatch.len()).map(|_| None).collect();
        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            query = %request.query,
                            "Overall search deadline reached, returning partial results"
                        );
                        break;
                    }
                },
                None => pending.next().await,
            };
            let Some((idx, joined)) = next else {
                break;
            };
            slots[idx] = Some(match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let indexer = &dispatch[idx];
                    warn!(indexer = %indexer.name(), error = %e, "Search task failed");
                    indexer.health().record_error(format!("search task failed: {}", e));
                    TaskOutcome::Failed
                }
            });
        }

        for (indexer, slot) in dispatch.iter().zip(slots) {
            let name = indexer.name().to_string();
            match slot {
                Some(TaskOutcome::Completed(results)) => {
                    if !results.is_empty() {
                        report.responded.push(name);
                        report.results.extend(results);
                    }
                }
                Some(TaskOutcome::TimedOut) => report.timed_out.push(name),
                Some(TaskOutcome::Failed) => {}
                None => report.abandoned.push(name),
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        metrics::SEARCH_RESULTS.observe(report.results.len() as f64);
        info!(
            query = %request.query,
            queried = report.queried.len(),
            responded = report.responded.len(),
            results = report.results.len(),
            duration_ms = report.duration_ms,
            "Search fan-out finished"
        );
        report
    }

    async fn candidates(&self, names: Option<&[String]>) -> Vec<Arc<dyn Indexer>> {
        let Some(names) = names.filter(|n| !n.is_empty()) else {
            return self.registry.list_healthy().await;
        };

        let mut out: Vec<Arc<dyn Indexer>> = Vec::new();
        for name in names {
            match self.registry.get(name).await {
                Some(indexer) if indexer.is_healthy() => {
                    if !out.iter().any(|i| i.name().eq_ignore_ascii_case(indexer.name())) {
                        out.push(indexer);
                    }
                }
                Some(_) => debug!(indexer = %name, "Requested indexer is unhealthy, skipping"),
                None => debug!(indexer = %name, "Requested indexer is not registered"),
            }
        }
        out
    }

    /// Drop blocked sites. A failing or slow guard counts as "not blocked".
    ///
    /// Checks share the overall deadline with the dispatch phase.
    async fn apply_site_guard(
        &self,
        candidates: Vec<Arc<dyn Indexer>>,
        deadline: Option<Instant>,
        report: &mut SearchReport,
    ) -> Vec<Arc<dyn Indexer>> {
        let Some(guard) = &self.site_guard else {
            return candidates;
        };

        let limit = match deadline {
            Some(deadline) => self
                .site_guard_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.site_guard_timeout,
        };
        let checks = candidates
            .iter()
            .map(|i| tokio::time::timeout(limit, guard.before_search(i.name())));
        let budgets = join_all(checks).await;

        let mut allowed = Vec::with_capacity(candidates.len());
        for (indexer, budget) in candidates.into_iter().zip(budgets) {
            match budget {
                Ok(Ok(budget)) if budget.blocked => {
                    let reason = budget.reason.unwrap_or_else(|| "blocked".to_string());
                    info!(
                        indexer = %indexer.name(),
                        reason = %reason,
                        until = ?budget.until,
                        "Site guard blocked search"
                    );
                    metrics::INDEXER_SEARCHES
                        .with_label_values(&[indexer.name(), "skipped"])
                        .inc();
                    report.skipped.push(SkippedIndexer {
                        name: indexer.name().to_string(),
                        reason,
                    });
                }
                Ok(Ok(budget)) => {
                    if budget.max_pages.is_some() || budget.max_minutes.is_some() {
                        debug!(
                            indexer = %indexer.name(),
                            max_pages = ?budget.max_pages,
                            max_minutes = ?budget.max_minutes,
                            "Site guard budget hint"
                        );
                    }
                    allowed.push(indexer);
                }
                Ok(Err(e)) => {
                    warn!(
                        indexer = %indexer.name(),
                        error = %e,
                        "Site guard check failed, searching anyway"
                    );
                    allowed.push(indexer);
                }
                Err(_) => {
                    warn!(
                        indexer = %indexer.name(),
                        timeout_ms = limit.as_millis() as u64,
                        "Site guard check timed out, searching anyway"
                    );
                    allowed.push(indexer);
                }
            }
        }
        allowed
    }
}

async fn run_one(
    indexer: Arc<dyn Indexer>,
    request: SearchRequest,
    timeout: Duration,
) -> TaskOutcome {
    let search = indexer.search(&request.query, request.media_type, request.year);
    match tokio::time::timeout(timeout, search).await {
        Ok(results) => TaskOutcome::Completed(results),
        Err(_) => {
            warn!(
                indexer = %indexer.name(),
                timeout_ms = timeout.as_millis() as u64,
                "Search timed out"
            );
            indexer
                .health()
                .record_error(format!("search timed out after {}ms", timeout.as_millis()));
            metrics::INDEXER_SEARCHES
                .with_label_values(&[indexer.name(), "timeout"])
                .inc();
            TaskOutcome::TimedOut
        }
    }
}
