//! Hit-and-Run status collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskLookupError {
    #[error("Risk lookup unavailable: {0}")]
    Unavailable(String),

    #[error("Risk lookup timed out")]
    Timeout,
}

/// H&R state of one torrent on one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrStatus {
    /// No H&R obligation.
    None,
    /// Obligation still running.
    Active,
    Finished,
    /// Obligation missed.
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrRecord {
    pub status: HrStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_grace: Option<Duration>,
}

impl HrRecord {
    pub fn new(status: HrStatus) -> Self {
        Self {
            status,
            remaining_grace: None,
        }
    }

    pub fn active(remaining_grace: Option<Duration>) -> Self {
        Self {
            status: HrStatus::Active,
            remaining_grace,
        }
    }
}

#[async_trait]
pub trait RiskLookup: Send + Sync {
    async fn lookup_hr_status(
        &self,
        site: &str,
        item_identifier: &str,
    ) -> Result<HrRecord, RiskLookupError>;
}
