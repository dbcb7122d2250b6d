//! Tracker site abstraction.
//!
//! An [`Indexer`] owns one site's configuration, HTTP session and health
//! state. Site failures never escape `search`: they are folded into the
//! circuit breaker and the caller sees an empty list.

mod health;
mod http;
mod private;
mod public;
mod rate_limiter;
mod registry;
mod site;

pub use health::{IndexerAccess, IndexerHealth, IndexerStatus};
pub use http::{DEFAULT_USER_AGENT, HEALTH_CHECK_TIMEOUT};
pub use private::PrivateIndexer;
pub use public::PublicIndexer;
pub use rate_limiter::{RateLimitStatus, TokenBucket};
pub use registry::IndexerRegistry;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{validate_indexer, IndexerConfig};
use crate::searcher::{MediaType, TorrentResult};

/// Errors raised inside an indexer.
///
/// Only construction errors reach callers; search-time errors are recorded
/// against the indexer's health.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request timed out")]
    Timeout,

    #[error("No credentials configured for {0}")]
    MissingCredentials(String),

    #[error("Invalid indexer configuration: {0}")]
    InvalidConfig(String),
}

/// One tracker site.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Configured name (original case).
    fn name(&self) -> &str;

    fn access(&self) -> IndexerAccess;

    fn health(&self) -> &IndexerHealth;

    /// Search the site. Never fails; failures yield an empty list and count
    /// against the circuit breaker.
    async fn search(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        year: Option<u32>,
    ) -> Vec<TorrentResult>;

    /// Probe the site and update health the same way a search would.
    async fn health_check(&self) -> bool;

    fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    fn status(&self) -> IndexerStatus {
        IndexerStatus::from_health(self.name(), self.access(), self.health())
    }
}

/// Build the indexer variant a config entry describes.
pub fn build_indexer(config: &IndexerConfig) -> Result<Arc<dyn Indexer>, IndexerError> {
    validate_indexer(config).map_err(|e| IndexerError::InvalidConfig(e.to_string()))?;

    let indexer: Arc<dyn Indexer> = if config.is_public {
        Arc::new(PublicIndexer::new(config.clone())?)
    } else {
        Arc::new(PrivateIndexer::new(config.clone())?)
    };
    Ok(indexer)
}
