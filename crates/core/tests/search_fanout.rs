//! Fan-out search integration tests.
//!
//! Runs the orchestrator against mock indexers and checks the
//! timeout, circuit-breaker and site-guard behaviour end to end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use trackhub_core::{
    testing::{fixtures, MockIndexer, MockSiteGuard},
    Indexer, IndexerRegistry, SearchOrchestrator, SearchRequest,
};

struct TestHarness {
    registry: Arc<IndexerRegistry>,
    guard: Arc<MockSiteGuard>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            registry: Arc::new(IndexerRegistry::new()),
            guard: Arc::new(MockSiteGuard::new()),
        }
    }

    async fn add(&self, indexer: MockIndexer) -> Arc<MockIndexer> {
        let indexer = Arc::new(indexer);
        self.registry.add(indexer.clone()).await;
        indexer
    }

    fn orchestrator(&self) -> SearchOrchestrator {
        SearchOrchestrator::new(self.registry.clone()).with_site_guard(self.guard.clone())
    }
}

#[tokio::test]
async fn slow_indexer_times_out_without_blocking_others() {
    let harness = TestHarness::new();
    harness
        .add(MockIndexer::new("site-a").with_results(vec![
            fixtures::result("Show S01E01 1080p", "site-a", 40),
            fixtures::result("Show S01E02 1080p", "site-a", 35),
        ]))
        .await;
    let slow = harness
        .add(
            MockIndexer::new("site-b")
                .with_delay(Duration::from_secs(10))
                .with_results(vec![fixtures::result("Show S01E01 720p", "site-b", 5)]),
        )
        .await;

    let orchestrator = harness.orchestrator();
    let started = Instant::now();
    let results = orchestrator
        .search_all(&SearchRequest::new("Show"), Duration::from_millis(100))
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.site == "site-a"));
    assert_eq!(slow.health().error_count(), 1);
}

#[tokio::test]
async fn report_accounts_for_every_indexer() {
    let harness = TestHarness::new();
    harness
        .add(MockIndexer::new("alpha").with_results(vec![fixtures::result("Film 2020", "alpha", 9)]))
        .await;
    harness
        .add(MockIndexer::new("beta").with_delay(Duration::from_secs(5)))
        .await;
    harness.add(MockIndexer::new("gamma")).await;
    harness.guard.block("gamma", "daily budget used").await;

    let report = harness
        .orchestrator()
        .search_with_report(&SearchRequest::new("Film"), Duration::from_millis(100))
        .await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "gamma");
    assert_eq!(report.skipped[0].reason, "daily budget used");
    assert_eq!(report.timed_out, vec!["beta".to_string()]);
    assert!(report.responded.contains(&"alpha".to_string()));
    assert!(!report.queried.contains(&"gamma".to_string()));
}

#[tokio::test]
async fn breaker_opens_after_repeated_failures_and_recovers() {
    let harness = TestHarness::new();
    harness
        .add(MockIndexer::new("steady").with_results(vec![fixtures::result("Film 2020", "steady", 3)]))
        .await;
    let flaky = harness
        .add(
            MockIndexer::new("flaky")
                .with_max_errors(3)
                .with_failure("HTTP 503")
                .with_health_check(false),
        )
        .await;

    let orchestrator = harness.orchestrator();
    let request = SearchRequest::new("Film");
    for _ in 0..3 {
        orchestrator.search(&request).await;
    }
    assert!(!flaky.is_healthy());
    assert_eq!(flaky.search_count(), 3);

    // Open breaker: no more traffic to the site.
    let results = orchestrator.search(&request).await;
    assert_eq!(results.len(), 1);
    assert_eq!(flaky.search_count(), 3);

    flaky.set_failure(None).await;
    flaky.set_health_check(true);
    let checks = harness.registry.health_check_all().await;
    assert!(checks.contains(&("flaky".to_string(), true)));
    assert!(flaky.is_healthy());
    assert_eq!(flaky.health().error_count(), 0);

    orchestrator.search(&request).await;
    assert_eq!(flaky.search_count(), 4);
}

#[tokio::test]
async fn results_keep_dispatch_order_across_indexers() {
    let harness = TestHarness::new();
    harness
        .add(
            MockIndexer::new("first")
                .with_delay(Duration::from_millis(50))
                .with_results(vec![fixtures::result("Film A", "first", 1)]),
        )
        .await;
    harness
        .add(MockIndexer::new("second").with_results(vec![fixtures::result("Film B", "second", 1)]))
        .await;

    let request = SearchRequest::new("Film").with_indexers(["first", "second"]);
    let results = harness.orchestrator().search(&request).await;

    let sites: Vec<_> = results.iter().map(|r| r.site.as_str()).collect();
    assert_eq!(sites, vec!["first", "second"]);
}
