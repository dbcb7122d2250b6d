use async_trait::async_trait;
use tracing::debug;

use super::site::SiteCore;
use super::{Indexer, IndexerAccess, IndexerError, IndexerHealth, IndexerStatus};
use crate::config::IndexerConfig;
use crate::searcher::{MediaType, SearchRequest, TorrentResult};

/// Private sites get fewer variants to keep request volume down.
const PRIVATE_QUERY_VARIANTS: usize = 2;

/// Site requiring a session cookie or API key.
pub struct PrivateIndexer {
    core: SiteCore,
}

impl PrivateIndexer {
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
        Ok(Self {
            core: SiteCore::new(config, IndexerAccess::Private)?,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.core.config.has_credentials()
    }

    pub fn search_url(&self, term: &str) -> String {
        self.core.search_url(term)
    }
}

#[async_trait]
impl Indexer for PrivateIndexer {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn access(&self) -> IndexerAccess {
        IndexerAccess::Private
    }

    fn health(&self) -> &IndexerHealth {
        &self.core.health
    }

    async fn search(
        &self,
        query: &str,
        _media_type: Option<MediaType>,
        year: Option<u32>,
    ) -> Vec<TorrentResult> {
        // A configuration gap, not a site failure.
        if !self.has_credentials() {
            debug!(
                indexer = %self.name(),
                "{}",
                IndexerError::MissingCredentials(self.name().to_string())
            );
            return Vec::new();
        }
        if !self.core.try_acquire() {
            return Vec::new();
        }

        // The type hint only helps keyword-poor public sites.
        let request = SearchRequest {
            query: query.to_string(),
            media_type: None,
            year,
            indexer_names: None,
        };
        let terms = request.query_variants(PRIVATE_QUERY_VARIANTS);
        self.core.run_search(&terms).await
    }

    async fn health_check(&self) -> bool {
        self.core.health_check().await
    }

    fn status(&self) -> IndexerStatus {
        self.core.status()
    }
}
