//! Filtering and scoring of results against subscription criteria.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

use super::criteria::{RuleKind, RuleLogic, SubscriptionCriteria};
use super::pattern::TextPattern;
use crate::parser::title::{parse_title, resolution_tier};
use crate::searcher::TorrentResult;

const RESOLUTION_EXACT: f64 = 40.0;
const RESOLUTION_NEAR: f64 = 15.0;
const RESOLUTION_OTHER: f64 = 5.0;
const RESOLUTION_TIER_UNTARGETED: f64 = 5.0;
const QUALITY_MATCH: f64 = 20.0;
const EFFECT_MATCH: f64 = 10.0;
const CODEC_MATCH: f64 = 10.0;
const SEEDER_WEIGHT: f64 = 8.0;
const SEEDER_CAP: f64 = 50.0;

/// Filter stage a result failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    Seeders,
    Size,
    Include,
    Exclude,
    FilterGroup,
    Season,
    Episode,
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterStage::Seeders => "below seeder floor",
            FilterStage::Size => "outside size bounds",
            FilterStage::Include => "no include pattern matched",
            FilterStage::Exclude => "matched an exclude pattern",
            FilterStage::FilterGroup => "failed a filter group",
            FilterStage::Season => "season not in window",
            FilterStage::Episode => "episodes not in window",
        };
        f.write_str(s)
    }
}

/// A result with its score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub score: f64,
    pub result: TorrentResult,
}

struct CompiledGroup {
    name: String,
    rules: Vec<(RuleKind, RuleLogic, Option<TextPattern>)>,
}

/// Criteria with patterns compiled once per call.
struct CompiledCriteria<'a> {
    criteria: &'a SubscriptionCriteria,
    include: Option<TextPattern>,
    exclude: Option<TextPattern>,
    groups: Vec<CompiledGroup>,
}

impl<'a> CompiledCriteria<'a> {
    fn new(criteria: &'a SubscriptionCriteria) -> Self {
        let mut groups: Vec<_> = criteria
            .filter_groups
            .iter()
            .filter(|g| !g.rules.is_empty())
            .collect();
        groups.sort_by_key(|g| g.priority);

        Self {
            criteria,
            include: criteria.include.as_deref().and_then(TextPattern::parse),
            exclude: criteria.exclude.as_deref().and_then(TextPattern::parse),
            groups: groups
                .into_iter()
                .map(|g| CompiledGroup {
                    name: g.name.clone(),
                    rules: g
                        .rules
                        .iter()
                        .map(|r| (r.kind, r.logic, TextPattern::parse(&r.pattern)))
                        .collect(),
                })
                .collect(),
        }
    }

    fn check(&self, result: &TorrentResult) -> Result<(), FilterStage> {
        let c = self.criteria;
        let title = result.title.as_str();

        if result.seeders < c.min_seeders {
            return Err(FilterStage::Seeders);
        }

        let size = finite_or_zero(result.size_gb);
        if c.min_size_gb.is_some_and(|min| size < min) || c.max_size_gb.is_some_and(|max| size > max)
        {
            return Err(FilterStage::Size);
        }

        if let Some(include) = &self.include {
            if !include.matches(title) {
                return Err(FilterStage::Include);
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.matches(title) {
                return Err(FilterStage::Exclude);
            }
        }

        for group in &self.groups {
            if !group_passes(group, title) {
                debug!(group = %group.name, title = %title, "Filter group rejected result");
                return Err(FilterStage::FilterGroup);
            }
        }

        if c.uses_episode_window() {
            let episodes = result.episodes();
            if let Some(season) = c.season {
                // A title with no season marker cannot be placed in the window.
                if episodes.covers_season(season) != Some(true) {
                    return Err(FilterStage::Season);
                }
            }
            if c.start_episode.is_some() || c.end_episode.is_some() {
                let start = c.start_episode.unwrap_or(1);
                // Season packs without episode markers stay in.
                if episodes.overlaps_episodes(start, c.end_episode) == Some(false) {
                    return Err(FilterStage::Episode);
                }
            }
        }

        Ok(())
    }
}

fn group_passes(group: &CompiledGroup, title: &str) -> bool {
    let rule_passes = |kind: RuleKind, pattern: &Option<TextPattern>| {
        let Some(pattern) = pattern else {
            return true;
        };
        match kind {
            RuleKind::Include => pattern.matches(title),
            RuleKind::Exclude => !pattern.matches(title),
        }
    };

    let mut any_or = false;
    let mut or_passed = false;
    for (kind, logic, pattern) in &group.rules {
        match logic {
            RuleLogic::And => {
                if !rule_passes(*kind, pattern) {
                    return false;
                }
            }
            RuleLogic::Or => {
                any_or = true;
                or_passed = or_passed || rule_passes(*kind, pattern);
            }
        }
    }
    !any_or || or_passed
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Stateless filter/score engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Check one result against the criteria filters.
    pub fn evaluate(
        &self,
        result: &TorrentResult,
        criteria: &SubscriptionCriteria,
    ) -> Result<(), FilterStage> {
        CompiledCriteria::new(criteria).check(result)
    }

    pub fn matches(&self, result: &TorrentResult, criteria: &SubscriptionCriteria) -> bool {
        self.evaluate(result, criteria).is_ok()
    }

    /// Filter, then order best-first. The output is always a subset of the
    /// input.
    pub fn filter_and_sort_results(
        &self,
        results: Vec<TorrentResult>,
        criteria: &SubscriptionCriteria,
    ) -> Vec<TorrentResult> {
        self.rank(results, criteria)
            .into_iter()
            .map(|s| s.result)
            .collect()
    }

    /// Like [`filter_and_sort_results`](Self::filter_and_sort_results) but
    /// keeps the scores.
    pub fn rank(
        &self,
        results: Vec<TorrentResult>,
        criteria: &SubscriptionCriteria,
    ) -> Vec<ScoredResult> {
        self.rank_at(results, criteria, Utc::now())
    }

    pub fn rank_at(
        &self,
        results: Vec<TorrentResult>,
        criteria: &SubscriptionCriteria,
        now: DateTime<Utc>,
    ) -> Vec<ScoredResult> {
        let compiled = CompiledCriteria::new(criteria);
        let before = results.len();

        let mut scored: Vec<ScoredResult> = results
            .into_iter()
            .filter(|r| match compiled.check(r) {
                Ok(()) => true,
                Err(stage) => {
                    debug!(title = %r.title, site = %r.site, reason = %stage, "Result filtered");
                    false
                }
            })
            .map(|r| ScoredResult {
                score: self.score_at(&r, criteria, now),
                result: r,
            })
            .collect();

        scored.sort_by(compare_ranked);
        debug!(before, after = scored.len(), "Rules applied");
        scored
    }

    /// Head of the ordered list.
    pub fn best_pick(
        &self,
        results: Vec<TorrentResult>,
        criteria: &SubscriptionCriteria,
    ) -> Option<TorrentResult> {
        self.filter_and_sort_results(results, criteria)
            .into_iter()
            .next()
    }

    /// Weighted score; always finite.
    pub fn score_result(&self, result: &TorrentResult, criteria: &SubscriptionCriteria) -> f64 {
        self.score_at(result, criteria, Utc::now())
    }

    pub fn score_at(
        &self,
        result: &TorrentResult,
        criteria: &SubscriptionCriteria,
        now: DateTime<Utc>,
    ) -> f64 {
        let title = result.title.to_lowercase();
        let parsed = parse_title(&result.title);

        let mut score = resolution_score(
            criteria.resolution.as_deref(),
            result.resolution.as_deref().or(parsed.resolution.as_deref()),
        );

        if let Some(quality) = non_blank(criteria.quality.as_deref()) {
            let quality = quality.to_lowercase();
            let result_quality = result.quality.as_deref().unwrap_or_default().to_lowercase();
            let result_source = result.source.as_deref().unwrap_or_default().to_lowercase();
            if title.contains(&quality) || result_quality == quality || result_source == quality {
                score += QUALITY_MATCH;
            }
        }

        if let Some(effect) = non_blank(criteria.effect.as_deref()) {
            if title.contains(&effect.to_lowercase()) {
                score += EFFECT_MATCH;
            }
        }

        if let Some(codec) = non_blank(criteria.codec.as_deref()) {
            let wanted = parse_title(codec).codec.unwrap_or_else(|| codec.to_string());
            let have = result.codec.as_deref().or(parsed.codec.as_deref());
            if have.is_some_and(|h| h.eq_ignore_ascii_case(&wanted))
                || title.contains(&codec.to_lowercase())
            {
                score += CODEC_MATCH;
            }
        }

        score += (f64::from(result.seeders).ln_1p() * SEEDER_WEIGHT).min(SEEDER_CAP);
        score += size_score(finite_or_zero(result.size_gb));
        score += recency_score(result.uploaded_at(), now);

        finite_or_zero(score)
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn resolution_score(wanted: Option<&str>, have: Option<&str>) -> f64 {
    let have_tier = have.and_then(resolution_tier);
    match (non_blank(wanted).and_then(resolution_tier), have_tier) {
        (Some(w), Some(h)) if w == h => RESOLUTION_EXACT,
        (Some(w), Some(h)) if w.abs_diff(h) == 1 => RESOLUTION_NEAR,
        (Some(_), _) => RESOLUTION_OTHER,
        (None, Some(h)) => f64::from(h) * RESOLUTION_TIER_UNTARGETED,
        (None, None) => 0.0,
    }
}

/// Mid-sized releases are the usual sweet spot.
fn size_score(size_gb: f64) -> f64 {
    if (5.0..=20.0).contains(&size_gb) {
        6.0
    } else if (1.0..5.0).contains(&size_gb) {
        4.0
    } else if size_gb > 0.0 {
        2.0
    } else {
        0.0
    }
}

fn recency_score(uploaded: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(uploaded) = uploaded else {
        return 0.0;
    };
    match (now - uploaded).num_days() {
        d if d <= 7 => 10.0,
        d if d <= 30 => 7.0,
        d if d <= 90 => 4.0,
        d if d <= 365 => 2.0,
        _ => 0.0,
    }
}

/// Score desc, then seeders desc, then earliest upload (unknown last).
fn compare_ranked(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.result.seeders.cmp(&a.result.seeders))
        .then_with(|| match (a.result.uploaded_at(), b.result.uploaded_at()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}
