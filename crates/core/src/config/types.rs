use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
}

/// Search fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Deadline for a single indexer's search.
    #[serde(default = "default_per_indexer_timeout_secs")]
    pub per_indexer_timeout_secs: u64,
    /// Optional deadline for the whole fan-out; partial results are
    /// returned when it expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_timeout_secs: Option<u64>,
    /// A site guard slower than this counts as "not blocked".
    #[serde(default = "default_site_guard_timeout_secs")]
    pub site_guard_timeout_secs: u64,
}

impl SearchConfig {
    pub fn per_indexer_timeout(&self) -> Duration {
        Duration::from_secs(self.per_indexer_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }

    pub fn site_guard_timeout(&self) -> Duration {
        Duration::from_secs(self.site_guard_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            per_indexer_timeout_secs: default_per_indexer_timeout_secs(),
            overall_timeout_secs: None,
            site_guard_timeout_secs: default_site_guard_timeout_secs(),
        }
    }
}

fn default_per_indexer_timeout_secs() -> u64 {
    30
}

fn default_site_guard_timeout_secs() -> u64 {
    5
}

/// Decision stage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionConfig {
    /// Candidates scoring below this are denied.
    #[serde(default = "default_min_accept_score")]
    pub min_accept_score: f64,
    /// Title similarity (0..=1) at which an existing item counts as a duplicate.
    #[serde(default = "default_duplicate_similarity")]
    pub duplicate_similarity: f64,
    /// Active H&R with at least this much grace left asks for confirmation
    /// instead of denying.
    #[serde(default = "default_hr_confirm_grace_hours")]
    pub hr_confirm_grace_hours: u64,
    #[serde(default = "default_risk_lookup_timeout_secs")]
    pub risk_lookup_timeout_secs: u64,
}

impl DecisionConfig {
    pub fn hr_confirm_grace(&self) -> Duration {
        Duration::from_secs(self.hr_confirm_grace_hours * 3600)
    }

    pub fn risk_lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.risk_lookup_timeout_secs)
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_accept_score: default_min_accept_score(),
            duplicate_similarity: default_duplicate_similarity(),
            hr_confirm_grace_hours: default_hr_confirm_grace_hours(),
            risk_lookup_timeout_secs: default_risk_lookup_timeout_secs(),
        }
    }
}

fn default_min_accept_score() -> f64 {
    20.0
}

fn default_duplicate_similarity() -> f64 {
    0.8
}

fn default_hr_confirm_grace_hours() -> u64 {
    24
}

fn default_risk_lookup_timeout_secs() -> u64 {
    5
}

/// One tracker site.
#[derive(Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    /// Unique key (case-insensitive).
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Requests allowed per `rate_interval` seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_interval: Option<u64>,
    /// `gazelle`, `nexus_php` or `unit3d`; sniffed from the URL when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser_type: Option<String>,
    /// Search URL template relative to `base_url`, with a `{query}` placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_path: Option<String>,
    /// Ask the site for free torrents only (NexusPHP `spstate=2`).
    #[serde(default)]
    pub free_only_search: bool,
}

impl IndexerConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            is_public: false,
            enabled: true,
            timeout_seconds: default_timeout_seconds(),
            max_consecutive_errors: default_max_consecutive_errors(),
            cookie: None,
            api_key: None,
            user_agent: None,
            rate_limit: None,
            rate_interval: None,
            parser_type: None,
            search_path: None,
            free_only_search: false,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.cookie.as_deref().is_some_and(|c| !c.trim().is_empty())
            || self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Registry key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

// Credentials must never reach logs.
impl fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("is_public", &self.is_public)
            .field("enabled", &self.enabled)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_consecutive_errors", &self.max_consecutive_errors)
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .field("rate_limit", &self.rate_limit)
            .field("rate_interval", &self.rate_interval)
            .field("parser_type", &self.parser_type)
            .field("search_path", &self.search_path)
            .field("free_only_search", &self.free_only_search)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_consecutive_errors() -> u32 {
    5
}

/// Configuration view safe to print: credentials are reduced to flags.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub search: SearchConfig,
    pub decision: DecisionConfig,
    pub indexers: Vec<SanitizedIndexerConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    pub name: String,
    pub base_url: String,
    pub is_public: bool,
    pub enabled: bool,
    pub timeout_seconds: u64,
    pub max_consecutive_errors: u32,
    pub cookie_configured: bool,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser_type: Option<String>,
}

impl From<&IndexerConfig> for SanitizedIndexerConfig {
    fn from(c: &IndexerConfig) -> Self {
        Self {
            name: c.name.clone(),
            base_url: c.base_url.clone(),
            is_public: c.is_public,
            enabled: c.enabled,
            timeout_seconds: c.timeout_seconds,
            max_consecutive_errors: c.max_consecutive_errors,
            cookie_configured: c.cookie.is_some(),
            api_key_configured: c.api_key.is_some(),
            rate_limit: c.rate_limit,
            rate_interval: c.rate_interval,
            parser_type: c.parser_type.clone(),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            search: config.search.clone(),
            decision: config.decision.clone(),
            indexers: config.indexers.iter().map(Into::into).collect(),
        }
    }
}
