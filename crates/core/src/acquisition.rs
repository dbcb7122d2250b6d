//! End-to-end acquisition for one subscription.
//!
//! search → dedup → security filter → rules → decisions in score order. The
//! first allowed candidate is handed to the [`DownloadInitiator`]; what
//! happens to the download afterwards is not tracked here.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decision::{
    Decision, DecisionContext, DecisionOutcome, DecisionService, ExistingItem, RiskLookup,
};
use crate::rules::{RuleEngine, SecurityPolicyFilter, SubscriptionCriteria};
use crate::searcher::{deduplicate_results, SearchOrchestrator, SearchRequest, TorrentResult};

#[derive(Debug, Clone, Error)]
pub enum HandoffError {
    #[error("Download client rejected torrent: {0}")]
    Rejected(String),

    #[error("Download client unavailable: {0}")]
    Unavailable(String),
}

/// Receives the selected torrent. Download lifecycle is its concern.
#[async_trait]
pub trait DownloadInitiator: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn initiate(&self, result: &TorrentResult, decision: &Decision)
        -> Result<(), HandoffError>;
}

/// One subscription's acquisition attempt.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub search: SearchRequest,
    pub criteria: SubscriptionCriteria,
    pub existing_items: Vec<ExistingItem>,
}

impl AcquisitionRequest {
    pub fn new(search: SearchRequest, criteria: SubscriptionCriteria) -> Self {
        Self {
            search,
            criteria,
            existing_items: Vec::new(),
        }
    }

    pub fn with_existing_items(mut self, items: Vec<ExistingItem>) -> Self {
        self.existing_items = items;
        self
    }
}

/// Results left after each stage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageCounts {
    pub searched: usize,
    pub deduplicated: usize,
    pub after_security: usize,
    pub after_rules: usize,
    pub decided: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionOutcome {
    HandedOff,
    HandoffFailed { error: String },
    /// Nothing allowed, but at least one candidate needs a user's go-ahead.
    AwaitingConfirmation,
    NoCandidate,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingCandidate {
    pub result: TorrentResult,
    pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub outcome: AcquisitionOutcome,
    pub counts: StageCounts,
    pub selected: Option<TorrentResult>,
    /// Decision for the selected candidate, else the most relevant one seen.
    pub decision: Option<Decision>,
    pub pending_confirmation: Vec<PendingCandidate>,
}

impl AcquisitionReport {
    pub fn is_handed_off(&self) -> bool {
        self.outcome == AcquisitionOutcome::HandedOff
    }
}

pub struct AcquisitionPipeline {
    orchestrator: Arc<SearchOrchestrator>,
    engine: RuleEngine,
    decisions: DecisionService,
    initiator: Arc<dyn DownloadInitiator>,
    risk: Option<Arc<dyn RiskLookup>>,
}

impl AcquisitionPipeline {
    pub fn new(
        orchestrator: Arc<SearchOrchestrator>,
        decisions: DecisionService,
        initiator: Arc<dyn DownloadInitiator>,
    ) -> Self {
        Self {
            orchestrator,
            engine: RuleEngine::new(),
            decisions,
            initiator,
            risk: None,
        }
    }

    pub fn with_risk_lookup(mut self, risk: Arc<dyn RiskLookup>) -> Self {
        self.risk = Some(risk);
        self
    }

    pub async fn acquire(&self, request: &AcquisitionRequest) -> AcquisitionReport {
        let criteria = &request.criteria;
        let mut counts = StageCounts::default();

        let results = self.orchestrator.search(&request.search).await;
        counts.searched = results.len();

        let results = deduplicate_results(results);
        counts.deduplicated = results.len();

        let results = SecurityPolicyFilter::apply(results, &criteria.security);
        counts.after_security = results.len();

        let ranked = self.engine.filter_and_sort_results(results, criteria);
        counts.after_rules = ranked.len();

        let context = DecisionContext {
            existing_items: request.existing_items.clone(),
            criteria: criteria.clone(),
            risk: self.risk.clone(),
        };

        let mut selected = None;
        let mut first_decision = None;
        let mut pending = Vec::new();
        for candidate in ranked {
            let decision = self.decisions.decide_download(&candidate, &context).await;
            counts.decided += 1;
            match decision.outcome {
                DecisionOutcome::Allow => {
                    selected = Some((candidate, decision));
                    break;
                }
                DecisionOutcome::RequireConfirm => pending.push(PendingCandidate {
                    result: candidate,
                    decision,
                }),
                DecisionOutcome::Deny => {
                    debug!(title = %candidate.title, reason = %decision.reason, "Candidate denied");
                    first_decision.get_or_insert(decision);
                }
            }
        }

        let report = match selected {
            Some((result, decision)) => {
                let outcome = match self.initiator.initiate(&result, &decision).await {
                    Ok(()) => {
                        info!(
                            query = %request.search.query,
                            title = %result.title,
                            site = %result.site,
                            client = %self.initiator.name(),
                            score = decision.score,
                            "Handed off download"
                        );
                        AcquisitionOutcome::HandedOff
                    }
                    Err(e) => {
                        warn!(
                            title = %result.title,
                            client = %self.initiator.name(),
                            error = %e,
                            "Download hand-off failed"
                        );
                        AcquisitionOutcome::HandoffFailed {
                            error: e.to_string(),
                        }
                    }
                };
                AcquisitionReport {
                    outcome,
                    counts,
                    selected: Some(result),
                    decision: Some(decision),
                    pending_confirmation: pending,
                }
            }
            None => {
                let outcome = if pending.is_empty() {
                    AcquisitionOutcome::NoCandidate
                } else {
                    AcquisitionOutcome::AwaitingConfirmation
                };
                let decision = pending
                    .first()
                    .map(|p| p.decision.clone())
                    .or(first_decision);
                AcquisitionReport {
                    outcome,
                    counts,
                    selected: None,
                    decision,
                    pending_confirmation: pending,
                }
            }
        };

        info!(
            query = %request.search.query,
            searched = counts.searched,
            deduplicated = counts.deduplicated,
            after_security = counts.after_security,
            after_rules = counts.after_rules,
            decided = counts.decided,
            outcome = ?report.outcome,
            "Acquisition finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecisionConfig;
    use crate::decision::{DecisionReason, HrRecord};
    use crate::indexer::IndexerRegistry;
    use crate::testing::{fixtures, MockDownloadInitiator, MockIndexer, MockRiskLookup};
    use std::time::Duration;

    async fn pipeline_with(
        results: Vec<TorrentResult>,
        initiator: Arc<MockDownloadInitiator>,
    ) -> AcquisitionPipeline {
        let registry = Arc::new(IndexerRegistry::new());
        registry
            .add(Arc::new(MockIndexer::new("site").with_results(results)))
            .await;
        let orchestrator = Arc::new(
            SearchOrchestrator::new(registry).with_per_indexer_timeout(Duration::from_secs(1)),
        );
        AcquisitionPipeline::new(
            orchestrator,
            DecisionService::new(DecisionConfig::default()),
            initiator,
        )
    }

    #[tokio::test]
    async fn test_hands_off_best_candidate() {
        let mut hr = fixtures::magnet_result("Show.S01E01.1080p.HR", "site", "a", 500);
        hr.is_hr = true;
        let results = vec![
            fixtures::magnet_result("Show.S01E01.720p", "site", "b", 30),
            fixtures::magnet_result("Show.S01E01.1080p", "site", "c", 20),
            fixtures::magnet_result("Show.S01E01.1080p.copy", "site", "c", 25),
            hr,
        ];
        let initiator = Arc::new(MockDownloadInitiator::new());
        let pipeline = pipeline_with(results, initiator.clone()).await;

        let criteria = SubscriptionCriteria {
            resolution: Some("1080p".to_string()),
            ..Default::default()
        };
        let report = pipeline
            .acquire(&AcquisitionRequest::new(SearchRequest::new("Show"), criteria))
            .await;

        assert!(report.is_handed_off());
        assert_eq!(report.counts.searched, 4);
        assert_eq!(report.counts.deduplicated, 3);
        assert_eq!(report.counts.after_security, 2);
        let selected = report.selected.unwrap();
        assert_eq!(selected.title, "Show.S01E01.1080p.copy");
        assert_eq!(initiator.handoffs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_candidate_when_all_denied() {
        let results = vec![fixtures::magnet_result("Show.S01E01", "site", "a", 0)];
        let initiator = Arc::new(MockDownloadInitiator::new());
        let pipeline = pipeline_with(results, initiator.clone()).await;

        let report = pipeline
            .acquire(&AcquisitionRequest::new(
                SearchRequest::new("Show"),
                SubscriptionCriteria::default(),
            ))
            .await;
        assert_eq!(report.outcome, AcquisitionOutcome::NoCandidate);
        assert_eq!(
            report.decision.map(|d| d.reason),
            Some(DecisionReason::BelowThreshold)
        );
        assert!(initiator.handoffs().await.is_empty());
    }

    #[tokio::test]
    async fn test_require_confirm_is_not_handed_off() {
        let mut result = fixtures::magnet_result("Movie.2024.1080p", "site", "a", 50);
        result.torrent_id = Some("42".to_string());
        let initiator = Arc::new(MockDownloadInitiator::new());
        let risk = Arc::new(MockRiskLookup::new());
        risk.set_record(
            "site",
            "42",
            HrRecord::active(Some(Duration::from_secs(72 * 3600))),
        )
        .await;
        let pipeline = pipeline_with(vec![result], initiator.clone())
            .await
            .with_risk_lookup(risk);

        let report = pipeline
            .acquire(&AcquisitionRequest::new(
                SearchRequest::new("Movie"),
                SubscriptionCriteria::default(),
            ))
            .await;
        assert_eq!(report.outcome, AcquisitionOutcome::AwaitingConfirmation);
        assert_eq!(report.pending_confirmation.len(), 1);
        assert!(initiator.handoffs().await.is_empty());
    }

    #[tokio::test]
    async fn test_handoff_failure_reported() {
        let results = vec![fixtures::magnet_result("Movie.2024.1080p", "site", "a", 50)];
        let initiator = Arc::new(MockDownloadInitiator::new());
        initiator
            .set_failure(Some(HandoffError::Unavailable("offline".to_string())))
            .await;
        let pipeline = pipeline_with(results, initiator).await;

        let report = pipeline
            .acquire(&AcquisitionRequest::new(
                SearchRequest::new("Movie"),
                SubscriptionCriteria::default(),
            ))
            .await;
        assert!(matches!(
            report.outcome,
            AcquisitionOutcome::HandoffFailed { .. }
        ));
        assert!(report.selected.is_some());
    }
}
