//! Per-candidate download decisions.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::risk::{HrRecord, HrStatus, RiskLookup, RiskLookupError};
use super::types::{
    normalize_key_resolution, Decision, DecisionContext, DecisionReason, ExistingItem,
};
use crate::config::DecisionConfig;
use crate::metrics;
use crate::parser::title::resolution_tier;
use crate::parser::{parse_title, title_similarity, EpisodeInfo};
use crate::rules::{RuleEngine, SecurityPolicyFilter};
use crate::searcher::TorrentResult;

/// Turns one candidate plus context into a [`Decision`].
///
/// Checks run in order: subscription rules, duplicates, quality against
/// owned releases, H&R risk, score threshold. A failing risk collaborator never blocks: the candidate is
/// allowed on its plain rule score with reason `FALLBACK`.
#[derive(Debug, Clone, Default)]
pub struct DecisionService {
    engine: RuleEngine,
    config: DecisionConfig,
}

impl DecisionService {
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            engine: RuleEngine::new(),
            config,
        }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub async fn decide_download(
        &self,
        candidate: &TorrentResult,
        context: &DecisionContext,
    ) -> Decision {
        let decision = self.evaluate(candidate, context).await;

        metrics::DECISIONS
            .with_label_values(&[decision.outcome.as_str(), decision.reason.as_str()])
            .inc();
        debug!(
            title = %candidate.title,
            site = %candidate.site,
            outcome = %decision.outcome,
            reason = %decision.reason,
            score = decision.score,
            "Decision made"
        );
        decision
    }

    async fn evaluate(&self, candidate: &TorrentResult, context: &DecisionContext) -> Decision {
        let criteria = &context.criteria;

        if let Err(stage) = self.engine.evaluate(candidate, criteria) {
            return Decision::deny(
                DecisionReason::RuleMismatch,
                0.0,
                format!("Does not match subscription rules: {}", stage),
            );
        }

        let score = self.engine.score_result(candidate, criteria);

        if let Some(existing) = self.find_duplicate(candidate, context) {
            return Decision::deny(
                DecisionReason::Duplicate,
                score,
                format!("Duplicate of existing item '{}'", existing.title),
            );
        }

        let mut reason = DecisionReason::Ok;
        if let Some(candidate_rank) = ReleaseRank::of_result(candidate) {
            if let Some((best, rank)) = self.best_owned(candidate, context) {
                if rank >= candidate_rank {
                    return Decision::deny(
                        DecisionReason::QualityInferior,
                        score,
                        format!("Not better than existing item '{}'", best.title),
                    );
                }
                reason = DecisionReason::OkUpgrade;
            }
        }

        if !SecurityPolicyFilter::allows(candidate, &criteria.security) {
            return Decision::deny(
                DecisionReason::HrRisk,
                score,
                "Hit-and-Run torrent not allowed by security policy",
            );
        }

        if let Some(risk) = &context.risk {
            match self.lookup_risk(risk.as_ref(), candidate).await {
                Ok(record) => {
                    if let Some(decision) = self.risk_decision(&record, &candidate.site, score) {
                        return decision;
                    }
                }
                Err(e) => {
                    warn!(
                        site = %candidate.site,
                        title = %candidate.title,
                        error = %e,
                        "Risk lookup failed, falling back to rule score"
                    );
                    return Decision::allow(
                        DecisionReason::Fallback,
                        score,
                        format!("Risk check unavailable ({}), allowed on rule score", e),
                    );
                }
            }
        }

        if score < self.config.min_accept_score {
            return Decision::deny(
                DecisionReason::BelowThreshold,
                score,
                format!(
                    "Score {:.1} below minimum {:.1}",
                    score, self.config.min_accept_score
                ),
            );
        }

        let message = match reason {
            DecisionReason::OkUpgrade => "Upgrades an existing release",
            _ => "Matches subscription rules",
        };
        Decision::allow(reason, score, message)
    }

    async fn lookup_risk(
        &self,
        risk: &dyn RiskLookup,
        candidate: &TorrentResult,
    ) -> Result<HrRecord, RiskLookupError> {
        let lookup = risk.lookup_hr_status(&candidate.site, candidate.identifier());
        match tokio::time::timeout(self.config.risk_lookup_timeout(), lookup).await {
            Ok(result) => result,
            Err(_) => Err(RiskLookupError::Timeout),
        }
    }

    fn risk_decision(&self, record: &HrRecord, site: &str, score: f64) -> Option<Decision> {
        match record.status {
            HrStatus::Active => {
                let threshold = self.config.hr_confirm_grace();
                match record.remaining_grace {
                    Some(grace) if grace >= threshold => {
                        info!(site = %site, grace_hours = hours(grace), "Active H&R within grace");
                        Some(Decision::require_confirm(
                            DecisionReason::HrRisk,
                            score,
                            format!(
                                "Active Hit-and-Run on {} with {}h grace left",
                                site,
                                hours(grace)
                            ),
                        ))
                    }
                    _ => Some(Decision::deny(
                        DecisionReason::HrRisk,
                        score,
                        format!("Active Hit-and-Run on {}", site),
                    )),
                }
            }
            HrStatus::Failed => Some(Decision::deny(
                DecisionReason::HrRisk,
                score,
                format!("Failed Hit-and-Run on {}", site),
            )),
            HrStatus::None | HrStatus::Finished | HrStatus::Unknown => None,
        }
    }

    fn find_duplicate<'a>(
        &self,
        candidate: &TorrentResult,
        context: &'a DecisionContext,
    ) -> Option<&'a ExistingItem> {
        let media_type = context.criteria.media_type;
        let quality = candidate.quality.as_deref().map(str::to_lowercase);
        let resolution = candidate
            .resolution
            .as_deref()
            .map(normalize_key_resolution);

        context.existing_items.iter().find(|item| {
            let media_ok = match (media_type, item.media_type) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            };
            let quality_ok = known_equal(
                quality.as_deref(),
                item.quality.as_deref().map(str::to_lowercase).as_deref(),
            );
            let resolution_ok = known_equal(
                resolution.as_deref(),
                item.normalized_resolution().as_deref(),
            );
            media_ok
                && quality_ok
                && resolution_ok
                && title_similarity(&candidate.title, &item.title)
                    >= self.config.duplicate_similarity
        })
    }

    /// Highest-ranked owned release covering the same content as `candidate`.
    fn best_owned<'a>(
        &self,
        candidate: &TorrentResult,
        context: &'a DecisionContext,
    ) -> Option<(&'a ExistingItem, ReleaseRank)> {
        let media_type = context.criteria.media_type;
        let coverage = EpisodeInfo::parse(&candidate.title);

        context
            .existing_items
            .iter()
            .filter(|item| match (media_type, item.media_type) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            })
            .filter(|item| same_coverage(&coverage, &EpisodeInfo::parse(&item.title)))
            .filter_map(|item| ReleaseRank::of_item(item).map(|rank| (item, rank)))
            .max_by_key(|(_, rank)| *rank)
    }
}

/// Resolution tier first, then source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ReleaseRank {
    tier: u8,
    source: u8,
}

impl ReleaseRank {
    fn of_result(result: &TorrentResult) -> Option<Self> {
        Self::from_parts(
            &result.title,
            result.resolution.as_deref(),
            result.quality.as_deref(),
            result.source.as_deref(),
        )
    }

    fn of_item(item: &ExistingItem) -> Option<Self> {
        Self::from_parts(
            &item.title,
            item.resolution.as_deref(),
            item.quality.as_deref(),
            None,
        )
    }

    /// `None` when no resolution is known; tagged fields win over the title.
    fn from_parts(
        title: &str,
        resolution: Option<&str>,
        quality: Option<&str>,
        source: Option<&str>,
    ) -> Option<Self> {
        let info = parse_title(title);
        let tier = [resolution, quality, info.resolution.as_deref()]
            .into_iter()
            .flatten()
            .find_map(resolution_tier)?;
        Some(Self {
            tier,
            source: source_rank(source.or(info.source.as_deref())),
        })
    }
}

fn source_rank(source: Option<&str>) -> u8 {
    match source {
        Some("Remux") => 7,
        Some("BluRay") => 6,
        Some("WEB-DL") => 5,
        Some("BDRip") | Some("WEBRip") => 4,
        Some("WEB") => 3,
        Some("HDRip") | Some("HDTV") => 2,
        Some("DVD") => 1,
        _ => 0,
    }
}

/// A season pack and one of its episodes overlap; S01E01 and S01E02 do not.
fn same_coverage(a: &EpisodeInfo, b: &EpisodeInfo) -> bool {
    let overlap = |x: Option<(u32, u32)>, y: Option<(u32, u32)>| match (x, y) {
        (Some((a1, a2)), Some((b1, b2))) => a1 <= b2 && b1 <= a2,
        _ => true,
    };
    overlap(a.seasons, b.seasons) && overlap(a.episodes, b.episodes)
}

/// Unknown on either side does not distinguish two items.
fn known_equal(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn hours(d: Duration) -> u64 {
    d.as_secs() / 3600
}
