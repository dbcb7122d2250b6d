//! Mock H&R risk lookup for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::decision::{HrRecord, HrStatus, RiskLookup, RiskLookupError};

/// Risk lookup answering from a `(site, identifier)` table.
///
/// Unknown keys answer [`HrStatus::None`].
#[derive(Debug, Default)]
pub struct MockRiskLookup {
    records: RwLock<HashMap<(String, String), HrRecord>>,
    failure: RwLock<Option<String>>,
    delay: Option<Duration>,
    lookups: RwLock<Vec<(String, String)>>,
}

impl MockRiskLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn set_record(&self, site: &str, identifier: &str, record: HrRecord) {
        self.records
            .write()
            .await
            .insert((site.to_string(), identifier.to_string()), record);
    }

    /// Fail every lookup with this message, or clear the failure.
    pub async fn set_failure(&self, message: Option<String>) {
        *self.failure.write().await = message;
    }

    pub async fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.read().await.clone()
    }
}

#[async_trait]
impl RiskLookup for MockRiskLookup {
    async fn lookup_hr_status(
        &self,
        site: &str,
        item_identifier: &str,
    ) -> Result<HrRecord, RiskLookupError> {
        self.lookups
            .write()
            .await
            .push((site.to_string(), item_identifier.to_string()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failure.read().await.clone() {
            return Err(RiskLookupError::Unavailable(message));
        }

        Ok(self
            .records
            .read()
            .await
            .get(&(site.to_string(), item_identifier.to_string()))
            .copied()
            .unwrap_or_else(|| HrRecord::new(HrStatus::None)))
    }
}
