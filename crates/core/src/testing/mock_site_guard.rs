//! Mock site guard for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::searcher::{SiteBudget, SiteGuard, SiteGuardError};

/// Site guard with per-site blocks and failures.
#[derive(Debug, Default)]
pub struct MockSiteGuard {
    budgets: RwLock<HashMap<String, SiteBudget>>,
    failing: RwLock<HashSet<String>>,
    calls: RwLock<Vec<String>>,
    delay: Option<Duration>,
}

impl MockSiteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering each check.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Block a site with a reason.
    pub async fn block(&self, indexer_name: &str, reason: &str) {
        self.set_budget(indexer_name, SiteBudget::blocked(reason)).await;
    }

    pub async fn set_budget(&self, indexer_name: &str, budget: SiteBudget) {
        self.budgets
            .write()
            .await
            .insert(indexer_name.to_lowercase(), budget);
    }

    /// Make the guard itself fail for a site.
    pub async fn fail_for(&self, indexer_name: &str) {
        self.failing
            .write()
            .await
            .insert(indexer_name.to_lowercase());
    }

    pub async fn clear(&self) {
        self.budgets.write().await.clear();
        self.failing.write().await.clear();
    }

    /// Site names consulted, in call order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl SiteGuard for MockSiteGuard {
    async fn before_search(&self, indexer_name: &str) -> Result<SiteBudget, SiteGuardError> {
        self.calls.write().await.push(indexer_name.to_string());
        let key = indexer_name.to_lowercase();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().await.contains(&key) {
            return Err(SiteGuardError::Unavailable(format!(
                "mock guard failure for {}",
                indexer_name
            )));
        }
        Ok(self
            .budgets
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}
