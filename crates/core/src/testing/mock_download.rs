//! Mock download initiator for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::acquisition::{DownloadInitiator, HandoffError};
use crate::decision::Decision;
use crate::searcher::TorrentResult;

/// A recorded hand-off for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedHandoff {
    pub result: TorrentResult,
    pub decision: Decision,
}

/// Download initiator that records hand-offs.
#[derive(Debug, Default)]
pub struct MockDownloadInitiator {
    handoffs: RwLock<Vec<RecordedHandoff>>,
    failure: RwLock<Option<HandoffError>>,
}

impl MockDownloadInitiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every hand-off with this error, or clear the failure.
    pub async fn set_failure(&self, error: Option<HandoffError>) {
        *self.failure.write().await = error;
    }

    /// Successful hand-offs, in order.
    pub async fn handoffs(&self) -> Vec<RecordedHandoff> {
        self.handoffs.read().await.clone()
    }
}

#[async_trait]
impl DownloadInitiator for MockDownloadInitiator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initiate(
        &self,
        result: &TorrentResult,
        decision: &Decision,
    ) -> Result<(), HandoffError> {
        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }
        self.handoffs.write().await.push(RecordedHandoff {
            result: result.clone(),
            decision: decision.clone(),
        });
        Ok(())
    }
}
