//! External per-site query budget.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteGuardError {
    #[error("Site guard unavailable: {0}")]
    Unavailable(String),
}

/// Budget answer for one site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteBudget {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    /// Soft pagination hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_minutes: Option<u32>,
}

impl SiteBudget {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Consulted before every dispatch to a site (risk-control cooldowns,
/// scan budgets).
#[async_trait]
pub trait SiteGuard: Send + Sync {
    async fn before_search(&self, indexer_name: &str) -> Result<SiteBudget, SiteGuardError>;
}

/// Guard that never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSiteGuard;

#[async_trait]
impl SiteGuard for OpenSiteGuard {
    async fn before_search(&self, _indexer_name: &str) -> Result<SiteBudget, SiteGuardError> {
        Ok(SiteBudget::open())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_guard_never_blocks() {
        let budget = OpenSiteGuard.before_search("any").await.unwrap();
        assert!(!budget.blocked);
        assert_eq!(budget, SiteBudget::open());
    }

    #[test]
    fn test_blocked_budget() {
        let budget = SiteBudget::blocked("cooldown");
        assert!(budget.blocked);
        assert_eq!(budget.reason.as_deref(), Some("cooldown"));
    }
}
