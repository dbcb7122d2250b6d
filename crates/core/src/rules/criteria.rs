use serde::{Deserialize, Serialize};

use super::SecurityPolicy;
use crate::searcher::MediaType;

/// One subscription's structured filter and scoring targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionCriteria {
    pub media_type: Option<MediaType>,
    /// Quality token, e.g. `BluRay` or `4K`. Scored, never filtered.
    pub quality: Option<String>,
    /// Target resolution, e.g. `1080p`. Scored, never filtered.
    pub resolution: Option<String>,
    /// Effect such as `HDR` or `DV`. Scored, never filtered.
    pub effect: Option<String>,
    pub codec: Option<String>,
    pub min_seeders: u32,
    /// Comma-separated keywords (any) or `/regex/`.
    pub include: Option<String>,
    /// Comma-separated keywords (any) or `/regex/`.
    pub exclude: Option<String>,
    pub filter_groups: Vec<FilterGroup>,
    pub min_size_gb: Option<f64>,
    pub max_size_gb: Option<f64>,
    pub season: Option<u32>,
    pub start_episode: Option<u32>,
    pub end_episode: Option<u32>,
    pub security: SecurityPolicy,
}

impl SubscriptionCriteria {
    /// Season/episode windows apply unless the media type is explicitly not
    /// TV-like.
    pub fn uses_episode_window(&self) -> bool {
        self.media_type.map_or(true, MediaType::is_tv_like)
            && (self.season.is_some() || self.start_episode.is_some() || self.end_episode.is_some())
    }
}

/// A named, prioritized set of rules; every group must pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub name: String,
    /// Lower runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub rules: Vec<FilterRule>,
}

fn default_priority() -> i32 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    pub pattern: String,
    #[serde(default)]
    pub logic: RuleLogic,
}

impl FilterRule {
    pub fn include(pattern: impl Into<String>, logic: RuleLogic) -> Self {
        Self {
            kind: RuleKind::Include,
            pattern: pattern.into(),
            logic,
        }
    }

    pub fn exclude(pattern: impl Into<String>, logic: RuleLogic) -> Self {
        Self {
            kind: RuleKind::Exclude,
            pattern: pattern.into(),
            logic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Include,
    Exclude,
}

/// Within a group, at least one `Or` rule and every `And` rule must pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_filter_groups() {
        let json = r#"{
            "min_seeders": 5,
            "filter_groups": [
                {"name": "groups", "priority": 1, "rules": [
                    {"type": "include", "pattern": "CHD", "logic": "or"},
                    {"type": "exclude", "pattern": "/cam|ts/"}
                ]}
            ]
        }"#;
        let criteria: SubscriptionCriteria = serde_json::from_str(json).unwrap();
        assert_eq!(criteria.min_seeders, 5);
        let rules = &criteria.filter_groups[0].rules;
        assert_eq!(rules[0].kind, RuleKind::Include);
        assert_eq!(rules[0].logic, RuleLogic::Or);
        assert_eq!(rules[1].logic, RuleLogic::And);
        assert!(!criteria.security.allow_hr);
    }

    #[test]
    fn test_episode_window_applies_to_tv_like() {
        let mut c = SubscriptionCriteria {
            season: Some(1),
            ..Default::default()
        };
        assert!(c.uses_episode_window());
        c.media_type = Some(MediaType::Anime);
        assert!(c.uses_episode_window());
        c.media_type = Some(MediaType::Movie);
        assert!(!c.uses_episode_window());
        c.media_type = Some(MediaType::Tv);
        c.season = None;
        assert!(!c.uses_episode_window());
    }
}
