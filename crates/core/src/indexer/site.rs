//! Search plumbing shared by public and private indexers.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::http::SiteClient;
use super::rate_limiter::TokenBucket;
use super::{IndexerAccess, IndexerError, IndexerHealth, IndexerStatus};
use crate::config::IndexerConfig;
use crate::metrics;
use crate::parser::{ParserKind, ParserStrategy, SiteParser};
use crate::searcher::TorrentResult;

const DEFAULT_RATE_INTERVAL_SECS: u64 = 60;

pub(crate) struct SiteCore {
    pub config: IndexerConfig,
    pub access: IndexerAccess,
    pub parser: SiteParser,
    pub client: SiteClient,
    pub health: IndexerHealth,
    limiter: Option<Mutex<TokenBucket>>,
}

impl SiteCore {
    pub fn new(config: IndexerConfig, access: IndexerAccess) -> Result<Self, IndexerError> {
        let kind = ParserKind::resolve(config.parser_type.as_deref(), &config.base_url);
        let parser = SiteParser::new(kind, &config.name, &config.base_url);
        let client = SiteClient::new(&config)?;
        let health = IndexerHealth::new(&config.name, config.max_consecutive_errors);
        let limiter = config.rate_limit.map(|requests| {
            let interval = config.rate_interval.unwrap_or(DEFAULT_RATE_INTERVAL_SECS);
            Mutex::new(TokenBucket::new(requests, Duration::from_secs(interval)))
        });

        Ok(Self {
            config,
            access,
            parser,
            client,
            health,
            limiter,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Build the search URL for one query term.
    pub fn search_url(&self, term: &str) -> String {
        let template = self
            .config
            .search_path
            .as_deref()
            .unwrap_or_else(|| self.parser.kind().default_search_path());
        let mut path = template.replace("{query}", &urlencoding::encode(term));
        if self.config.free_only_search && self.parser.kind() == ParserKind::NexusPhp {
            path.push(if path.contains('?') { '&' } else { '?' });
            path.push_str("spstate=2");
        }

        let base = self.config.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Take a rate-limit token. An exhausted bucket skips the search without
    /// counting as a site failure.
    pub fn try_acquire(&self) -> bool {
        let Some(limiter) = &self.limiter else {
            return true;
        };
        let mut bucket = limiter.lock().unwrap_or_else(|e| e.into_inner());
        match bucket.try_acquire() {
            Ok(()) => true,
            Err(wait) => {
                info!(
                    indexer = %self.name(),
                    retry_after_ms = wait.as_millis() as u64,
                    "Rate limit reached, skipping search"
                );
                metrics::INDEXER_SEARCHES
                    .with_label_values(&[self.name(), "skipped"])
                    .inc();
                false
            }
        }
    }

    /// Fetch and parse every term, merging without repeats. The first failing
    /// term fails the whole search.
    pub async fn fetch_terms(&self, terms: &[String]) -> Result<Vec<TorrentResult>, IndexerError> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for term in terms {
            let url = self.search_url(term);
            let html = self.client.get_text(&url).await?;
            let results = self.parser.parse_search_results(&html);
            debug!(
                indexer = %self.name(),
                term = %term,
                count = results.len(),
                "Parsed search page"
            );
            for r in results {
                if seen.insert(merge_key(&r)) {
                    merged.push(r);
                }
            }
        }
        Ok(merged)
    }

    /// Run a search and fold its outcome into the health state.
    pub async fn run_search(&self, terms: &[String]) -> Vec<TorrentResult> {
        self.health.mark_searched();
        let started = Instant::now();
        let outcome = self.fetch_terms(terms).await;
        metrics::INDEXER_SEARCH_DURATION
            .with_label_values(&[self.name()])
            .observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok(results) => {
                self.health.reset_errors();
                metrics::INDEXER_SEARCHES
                    .with_label_values(&[self.name(), "success"])
                    .inc();
                info!(
                    indexer = %self.name(),
                    count = results.len(),
                    "Search completed"
                );
                results
            }
            Err(e) => {
                warn!(indexer = %self.name(), error = %e, "Search failed");
                self.health.record_error(e.to_string());
                metrics::INDEXER_SEARCHES
                    .with_label_values(&[self.name(), "error"])
                    .inc();
                Vec::new()
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        self.health.mark_checked();
        match self.client.probe(&self.config.base_url).await {
            Ok(()) => {
                self.health.reset_errors();
                true
            }
            Err(e) => {
                warn!(indexer = %self.name(), error = %e, "Health check failed");
                self.health.record_error(e.to_string());
                false
            }
        }
    }

    pub fn status(&self) -> IndexerStatus {
        let mut status = IndexerStatus::from_health(self.name(), self.access, &self.health);
        status.rate_limit = self
            .limiter
            .as_ref()
            .map(|l| l.lock().unwrap_or_else(|e| e.into_inner()).status());
        status
    }
}

fn merge_key(r: &TorrentResult) -> String {
    r.info_hash
        .clone()
        .or_else(|| r.torrent_url.clone())
        .or_else(|| r.magnet_link.clone())
        .unwrap_or_else(|| r.title.clone())
}
