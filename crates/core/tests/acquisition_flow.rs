//! Acquisition pipeline integration tests.
//!
//! These tests drive a request through the whole chain:
//! fan-out search -> dedup -> security filter -> rules -> decision -> hand-off

use std::sync::Arc;
use std::time::Duration;

use trackhub_core::{
    testing::{fixtures, MockDownloadInitiator, MockIndexer, MockRiskLookup},
    AcquisitionOutcome, AcquisitionPipeline, AcquisitionRequest, DecisionReason, DecisionService,
    ExistingItem, HandoffError, HrRecord, IndexerRegistry, SearchOrchestrator, SearchRequest,
    SubscriptionCriteria, TorrentResult,
};

/// Test helper wiring mock sites, risk lookup and download client together.
struct TestHarness {
    registry: Arc<IndexerRegistry>,
    risk: Arc<MockRiskLookup>,
    initiator: Arc<MockDownloadInitiator>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            registry: Arc::new(IndexerRegistry::new()),
            risk: Arc::new(MockRiskLookup::new()),
            initiator: Arc::new(MockDownloadInitiator::new()),
        }
    }

    async fn site(&self, name: &str, results: Vec<TorrentResult>) {
        self.registry
            .add(Arc::new(MockIndexer::new(name).with_results(results)))
            .await;
    }

    fn pipeline(&self) -> AcquisitionPipeline {
        let orchestrator = Arc::new(
            SearchOrchestrator::new(self.registry.clone())
                .with_per_indexer_timeout(Duration::from_secs(2)),
        );
        AcquisitionPipeline::new(orchestrator, DecisionService::default(), self.initiator.clone())
            .with_risk_lookup(self.risk.clone())
    }
}

fn full_hd_criteria() -> SubscriptionCriteria {
    SubscriptionCriteria {
        min_seeders: 5,
        resolution: Some("1080p".to_string()),
        ..Default::default()
    }
}

fn film_listings() -> (Vec<TorrentResult>, Vec<TorrentResult>) {
    let site_a = vec![
        fixtures::result("Film.2020.1080p.WEB-DL.x264", "site-a", 3),
        fixtures::result("Film.2020.720p.WEB-DL.x264", "site-a", 50),
    ];
    let site_b = vec![fixtures::result("Film.2020.1080p.BluRay.x264", "site-b", 20)];
    (site_a, site_b)
}

#[tokio::test]
async fn resolution_match_wins_over_seeders() {
    let harness = TestHarness::new();
    let (site_a, site_b) = film_listings();
    harness.site("site-a", site_a).await;
    harness.site("site-b", site_b).await;

    let request = AcquisitionRequest::new(SearchRequest::new("Film 2020"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;

    assert!(report.is_handed_off());
    assert_eq!(report.counts.searched, 3);
    assert_eq!(report.counts.after_rules, 2);
    let selected = report.selected.expect("a candidate should be selected");
    assert_eq!(selected.title, "Film.2020.1080p.BluRay.x264");

    let handoffs = harness.initiator.handoffs().await;
    assert_eq!(handoffs.len(), 1);
    assert_eq!(handoffs[0].result.title, selected.title);
    assert_eq!(handoffs[0].decision.reason, DecisionReason::Ok);
}

#[tokio::test]
async fn owned_release_blocks_duplicates_and_lesser_copies() {
    let harness = TestHarness::new();
    let (site_a, site_b) = film_listings();
    let owned = ExistingItem::from_result(&site_b[0], None);
    harness.site("site-a", site_a).await;
    harness.site("site-b", site_b).await;

    let request = AcquisitionRequest::new(SearchRequest::new("Film 2020"), full_hd_criteria())
        .with_existing_items(vec![owned]);
    let report = harness.pipeline().acquire(&request).await;

    assert_eq!(report.outcome, AcquisitionOutcome::NoCandidate);
    assert_eq!(report.counts.decided, 2);
    assert_eq!(
        report.decision.map(|d| d.reason),
        Some(DecisionReason::Duplicate)
    );
    assert!(harness.initiator.handoffs().await.is_empty());
}

#[tokio::test]
async fn better_release_upgrades_owned_copy() {
    let harness = TestHarness::new();
    let (site_a, site_b) = film_listings();
    let owned = ExistingItem::from_result(&site_a[1], None);
    harness.site("site-a", site_a).await;
    harness.site("site-b", site_b).await;

    let request = AcquisitionRequest::new(SearchRequest::new("Film 2020"), full_hd_criteria())
        .with_existing_items(vec![owned]);
    let report = harness.pipeline().acquire(&request).await;

    assert!(report.is_handed_off());
    let decision = report.decision.expect("decision should be reported");
    assert_eq!(decision.reason, DecisionReason::OkUpgrade);
    assert_eq!(
        report.selected.map(|r| r.title).as_deref(),
        Some("Film.2020.1080p.BluRay.x264")
    );
}

#[tokio::test]
async fn same_torrent_on_two_sites_is_decided_once() {
    let harness = TestHarness::new();
    harness
        .site(
            "site-a",
            vec![fixtures::magnet_result("Film.2020.1080p.WEB-DL", "site-a", "c", 12)],
        )
        .await;
    harness
        .site(
            "site-b",
            vec![fixtures::magnet_result("Film.2020.1080p.WEB-DL", "site-b", "C", 30)],
        )
        .await;

    let request = AcquisitionRequest::new(SearchRequest::new("Film"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;

    assert_eq!(report.counts.searched, 2);
    assert_eq!(report.counts.deduplicated, 1);
    let selected = report.selected.expect("a candidate should be selected");
    assert_eq!(selected.site, "site-b");
    assert_eq!(selected.seeders, 30);
}

#[tokio::test]
async fn hit_and_run_listings_follow_security_policy() {
    let harness = TestHarness::new();
    let mut risky = fixtures::result("Film.2020.1080p.BluRay.x264", "site-a", 80);
    risky.is_hr = true;
    let safe = fixtures::result("Film.2020.1080p.WEB-DL.x264", "site-a", 10);
    harness.site("site-a", vec![risky, safe]).await;

    let request = AcquisitionRequest::new(SearchRequest::new("Film"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;
    assert_eq!(report.counts.after_security, 1);
    assert_eq!(
        report.selected.map(|r| r.title).as_deref(),
        Some("Film.2020.1080p.WEB-DL.x264")
    );

    let mut criteria = full_hd_criteria();
    criteria.security.allow_hr = true;
    criteria.security.allow_h3h5 = true;
    let request = AcquisitionRequest::new(SearchRequest::new("Film"), criteria);
    let report = harness.pipeline().acquire(&request).await;
    assert_eq!(report.counts.after_security, 2);
    assert_eq!(
        report.selected.map(|r| r.title).as_deref(),
        Some("Film.2020.1080p.BluRay.x264")
    );
}

#[tokio::test]
async fn active_hit_and_run_with_grace_awaits_confirmation() {
    let harness = TestHarness::new();
    let title = "Show.S01E01.1080p.WEB-DL.x265";
    harness
        .site("site-a", vec![fixtures::episode("Show", 1, 1, "site-a", 25)])
        .await;
    harness
        .risk
        .set_record(
            "site-a",
            title,
            HrRecord::active(Some(Duration::from_secs(72 * 3600))),
        )
        .await;

    let request = AcquisitionRequest::new(SearchRequest::new("Show"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;

    assert_eq!(report.outcome, AcquisitionOutcome::AwaitingConfirmation);
    assert_eq!(report.pending_confirmation.len(), 1);
    assert_eq!(report.pending_confirmation[0].result.title, title);
    assert!(harness.initiator.handoffs().await.is_empty());
    assert_eq!(harness.risk.lookups().await, vec![("site-a".to_string(), title.to_string())]);
}

#[tokio::test]
async fn unreachable_risk_service_falls_back_to_rule_score() {
    let harness = TestHarness::new();
    harness
        .site("site-a", vec![fixtures::episode("Show", 1, 2, "site-a", 25)])
        .await;
    harness.risk.set_failure(Some("connection refused".to_string())).await;

    let request = AcquisitionRequest::new(SearchRequest::new("Show"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;

    assert!(report.is_handed_off());
    let decision = report.decision.expect("decision should be reported");
    assert_eq!(decision.reason, DecisionReason::Fallback);
    assert!(decision.score > 0.0);
}

#[tokio::test]
async fn failed_handoff_is_reported() {
    let harness = TestHarness::new();
    harness
        .site("site-a", vec![fixtures::episode("Show", 2, 1, "site-a", 25)])
        .await;
    harness
        .initiator
        .set_failure(Some(HandoffError::Unavailable("client offline".to_string())))
        .await;

    let request = AcquisitionRequest::new(SearchRequest::new("Show"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;

    assert!(matches!(
        report.outcome,
        AcquisitionOutcome::HandoffFailed { .. }
    ));
    assert!(report.selected.is_some());
}

#[tokio::test]
async fn nothing_passing_rules_yields_no_candidate() {
    let harness = TestHarness::new();
    harness
        .site("site-a", vec![fixtures::result("Film.2020.1080p", "site-a", 1)])
        .await;

    let request = AcquisitionRequest::new(SearchRequest::new("Film"), full_hd_criteria());
    let report = harness.pipeline().acquire(&request).await;

    assert_eq!(report.outcome, AcquisitionOutcome::NoCandidate);
    assert_eq!(report.counts.after_rules, 0);
    assert!(report.selected.is_none());
}
