//! Mock indexer for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::indexer::{Indexer, IndexerAccess, IndexerHealth};
use crate::searcher::{MediaType, TorrentResult};

/// A recorded search for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub query: String,
    pub media_type: Option<MediaType>,
    pub year: Option<u32>,
}

/// Mock implementation of the [`Indexer`] trait.
///
/// Health bookkeeping follows the real indexers: a failing search records an
/// error, a successful one resets the count.
///
/// # Example
///
/// ```rust,ignore
/// use trackhub_core::testing::{fixtures, MockIndexer};
///
/// let indexer = MockIndexer::new("site-a")
///     .with_results(vec![fixtures::result("Show S01E01 1080p", "site-a", 20)])
///     .with_delay(Duration::from_millis(50));
/// ```
pub struct MockIndexer {
    name: String,
    access: IndexerAccess,
    health: IndexerHealth,
    results: RwLock<Vec<TorrentResult>>,
    delay: Option<Duration>,
    failure: RwLock<Option<String>>,
    health_check_ok: AtomicBool,
    searches: RwLock<Vec<RecordedSearch>>,
    search_count: AtomicUsize,
}

impl std::fmt::Debug for MockIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockIndexer")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("delay", &self.delay)
            .field("searches", &self.search_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockIndexer {
    /// Create a healthy public mock with no results.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            health: IndexerHealth::new(name.clone(), 5),
            name,
            access: IndexerAccess::Public,
            results: RwLock::new(Vec::new()),
            delay: None,
            failure: RwLock::new(None),
            health_check_ok: AtomicBool::new(true),
            searches: RwLock::new(Vec::new()),
            search_count: AtomicUsize::new(0),
        }
    }

    pub fn with_results(mut self, results: Vec<TorrentResult>) -> Self {
        *self.results.get_mut() = results;
        self
    }

    /// Sleep before answering each search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every search fails with this message.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        *self.failure.get_mut() = Some(message.into());
        self
    }

    pub fn with_max_errors(mut self, max_consecutive_errors: u32) -> Self {
        self.health = IndexerHealth::new(self.name.clone(), max_consecutive_errors);
        self
    }

    pub fn with_health_check(self, ok: bool) -> Self {
        self.health_check_ok.store(ok, Ordering::SeqCst);
        self
    }

    pub fn with_access(mut self, access: IndexerAccess) -> Self {
        self.access = access;
        self
    }

    pub async fn set_results(&self, results: Vec<TorrentResult>) {
        *self.results.write().await = results;
    }

    /// Set or clear the failure for subsequent searches.
    pub async fn set_failure(&self, message: Option<String>) {
        *self.failure.write().await = message;
    }

    pub fn set_health_check(&self, ok: bool) {
        self.health_check_ok.store(ok, Ordering::SeqCst);
    }

    pub fn search_count(&self) -> usize {
        self.search_count.load(Ordering::SeqCst)
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    fn name(&self) -> &str {
        &self.name
    }

    fn access(&self) -> IndexerAccess {
        self.access
    }

    fn health(&self) -> &IndexerHealth {
        &self.health
    }

    async fn search(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        year: Option<u32>,
    ) -> Vec<TorrentResult> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        self.searches.write().await.push(RecordedSearch {
            query: query.to_string(),
            media_type,
            year,
        });
        self.health.mark_searched();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failure.read().await.clone() {
            self.health.record_error(message);
            return Vec::new();
        }

        self.health.reset_errors();
        self.results.read().await.clone()
    }

    async fn health_check(&self) -> bool {
        self.health.mark_checked();
        let ok = self.health_check_ok.load(Ordering::SeqCst);
        if ok {
            self.health.reset_errors();
        } else {
            self.health.record_error("health check failed");
        }
        ok
    }
}
