use async_trait::async_trait;

use super::site::SiteCore;
use super::{Indexer, IndexerAccess, IndexerError, IndexerHealth, IndexerStatus};
use crate::config::IndexerConfig;
use crate::searcher::{MediaType, SearchRequest, TorrentResult};

/// Query variants tried per search on a public site.
const PUBLIC_QUERY_VARIANTS: usize = 3;

/// Credential-free site.
pub struct PublicIndexer {
    core: SiteCore,
}

impl PublicIndexer {
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
        Ok(Self {
            core: SiteCore::new(config, IndexerAccess::Public)?,
        })
    }

    pub fn search_url(&self, term: &str) -> String {
        self.core.search_url(term)
    }
}

#[async_trait]
impl Indexer for PublicIndexer {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn access(&self) -> IndexerAccess {
        IndexerAccess::Public
    }

    fn health(&self) -> &IndexerHealth {
        &self.core.health
    }

    async fn search(
        &self,
        query: &str,
        media_type: Option<MediaType>,
        year: Option<u32>,
    ) -> Vec<TorrentResult> {
        if !self.core.try_acquire() {
            return Vec::new();
        }
        let request = SearchRequest {
            query: query.to_string(),
            media_type,
            year,
            indexer_names: None,
        };
        let terms = request.query_variants(PUBLIC_QUERY_VARIANTS);
        self.core.run_search(&terms).await
    }

    async fn health_check(&self) -> bool {
        self.core.health_check().await
    }

    fn status(&self) -> IndexerStatus {
        self.core.status()
    }
}
