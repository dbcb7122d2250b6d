use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::{build_indexer, Indexer, IndexerError, IndexerStatus};
use crate::config::IndexerConfig;

/// Configured indexers keyed by lowercase name.
///
/// Searches take snapshots under the read lock, so an add/remove never
/// exposes a half-updated set.
#[derive(Default)]
pub struct IndexerRegistry {
    indexers: RwLock<BTreeMap<String, Arc<dyn Indexer>>>,
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled indexer. Any invalid entry fails the whole load.
    pub fn from_configs(configs: &[IndexerConfig]) -> Result<Self, IndexerError> {
        let mut map = BTreeMap::new();
        for config in configs {
            if !config.enabled {
                info!(indexer = %config.name, "Indexer disabled in config, skipping");
                continue;
            }
            map.insert(config.key(), build_indexer(config)?);
        }
        info!(count = map.len(), "Indexer registry loaded");
        Ok(Self {
            indexers: RwLock::new(map),
        })
    }

    /// Register an indexer, replacing any with the same name.
    pub async fn add(&self, indexer: Arc<dyn Indexer>) -> Option<Arc<dyn Indexer>> {
        let key = indexer.name().to_lowercase();
        self.indexers.write().await.insert(key, indexer)
    }

    pub async fn remove(&self, name: &str) -> Option<Arc<dyn Indexer>> {
        self.indexers.write().await.remove(&name.to_lowercase())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Indexer>> {
        self.indexers.read().await.get(&name.to_lowercase()).cloned()
    }

    /// All indexers, ordered by name.
    pub async fn list_all(&self) -> Vec<Arc<dyn Indexer>> {
        self.indexers.read().await.values().cloned().collect()
    }

    /// Indexers whose circuit breaker is closed, ordered by name.
    pub async fn list_healthy(&self) -> Vec<Arc<dyn Indexer>> {
        self.indexers
            .read()
            .await
            .values()
            .filter(|i| i.is_healthy())
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.indexers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.indexers.read().await.is_empty()
    }

    pub async fn statuses(&self) -> Vec<IndexerStatus> {
        self.list_all().await.iter().map(|i| i.status()).collect()
    }

    /// Probe every indexer concurrently.
    pub async fn health_check_all(&self) -> Vec<(String, bool)> {
        let indexers = self.list_all().await;
        let checks = indexers.iter().map(|i| async move {
            let ok = i.health_check().await;
            (i.name().to_string(), ok)
        });
        join_all(checks).await
    }
}
