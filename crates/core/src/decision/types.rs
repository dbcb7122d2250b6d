use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::risk::RiskLookup;
use crate::parser::title::normalize_resolution;
use crate::rules::SubscriptionCriteria;
use crate::searcher::{MediaType, TorrentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    Allow,
    Deny,
    RequireConfirm,
}

impl DecisionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionOutcome::Allow => "ALLOW",
            DecisionOutcome::Deny => "DENY",
            DecisionOutcome::RequireConfirm => "REQUIRE_CONFIRM",
        }
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-checkable reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    Ok,
    /// Allowed as a better release than everything already owned.
    OkUpgrade,
    Duplicate,
    /// No better than an owned release covering the same content.
    QualityInferior,
    HrRisk,
    BelowThreshold,
    RuleMismatch,
    /// The risk path was unavailable; allowed on plain rule score.
    Fallback,
}

impl DecisionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionReason::Ok => "OK",
            DecisionReason::OkUpgrade => "OK_UPGRADE",
            DecisionReason::Duplicate => "DUPLICATE",
            DecisionReason::QualityInferior => "QUALITY_INFERIOR",
            DecisionReason::HrRisk => "HR_RISK",
            DecisionReason::BelowThreshold => "BELOW_THRESHOLD",
            DecisionReason::RuleMismatch => "RULE_MISMATCH",
            DecisionReason::Fallback => "FALLBACK",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    pub reason: DecisionReason,
    pub score: f64,
    pub message: String,
}

impl Decision {
    pub fn allow(reason: DecisionReason, score: f64, message: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::Allow,
            reason,
            score,
            message: message.into(),
        }
    }

    pub fn deny(reason: DecisionReason, score: f64, message: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::Deny,
            reason,
            score,
            message: message.into(),
        }
    }

    pub fn require_confirm(reason: DecisionReason, score: f64, message: impl Into<String>) -> Self {
        Self {
            outcome: DecisionOutcome::RequireConfirm,
            reason,
            score,
            message: message.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == DecisionOutcome::Allow
    }
}

/// Something already downloaded or in flight for the same subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExistingItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl ExistingItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Snapshot of a result that was handed off earlier.
    pub fn from_result(result: &TorrentResult, media_type: Option<MediaType>) -> Self {
        Self {
            title: result.title.clone(),
            media_type,
            quality: result.quality.clone(),
            resolution: result.resolution.clone(),
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub(crate) fn normalized_resolution(&self) -> Option<String> {
        self.resolution.as_deref().map(normalize_key_resolution)
    }
}

pub(crate) fn normalize_key_resolution(r: &str) -> String {
    normalize_resolution(r).unwrap_or_else(|| r.trim().to_lowercase())
}

/// Everything the decision needs besides the candidate.
#[derive(Clone, Default)]
pub struct DecisionContext {
    pub existing_items: Vec<ExistingItem>,
    pub criteria: SubscriptionCriteria,
    /// Optional H&R status source.
    pub risk: Option<Arc<dyn RiskLookup>>,
}

impl fmt::Debug for DecisionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionContext")
            .field("existing_items", &self.existing_items)
            .field("criteria", &self.criteria)
            .field("risk", &self.risk.as_ref().map(|_| "<risk lookup>"))
            .finish()
    }
}

impl DecisionContext {
    pub fn new(criteria: SubscriptionCriteria) -> Self {
        Self {
            criteria,
            ..Default::default()
        }
    }

    pub fn with_existing_items(mut self, items: Vec<ExistingItem>) -> Self {
        self.existing_items = items;
        self
    }

    pub fn with_risk_lookup(mut self, risk: Arc<dyn RiskLookup>) -> Self {
        self.risk = Some(risk);
        self
    }
}
