use std::collections::HashSet;

use super::{types::Config, ConfigError, IndexerConfig};
use crate::parser::ParserKind;

/// Validate configuration
///
/// This is the only place configuration problems are fatal; everything
/// checked here would otherwise surface as per-site failures at search time.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.search.per_indexer_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.per_indexer_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.search.overall_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "search.overall_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.search.site_guard_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "search.site_guard_timeout_secs cannot be 0".to_string(),
        ));
    }

    let similarity = config.decision.duplicate_similarity;
    if !(0.0..=1.0).contains(&similarity) {
        return Err(ConfigError::ValidationError(format!(
            "decision.duplicate_similarity must be within 0..=1, got {}",
            similarity
        )));
    }
    if !config.decision.min_accept_score.is_finite() {
        return Err(ConfigError::ValidationError(
            "decision.min_accept_score must be finite".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for indexer in &config.indexers {
        validate_indexer(indexer)?;
        if !names.insert(indexer.key()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate indexer name '{}'",
                indexer.name
            )));
        }
    }

    Ok(())
}

/// Validate a single indexer entry
pub fn validate_indexer(indexer: &IndexerConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if indexer.name.trim().is_empty() {
        return invalid("indexer name cannot be empty".to_string());
    }
    let url = indexer.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://"))
        || reqwest::Url::parse(url).is_err()
    {
        return invalid(format!(
            "indexer '{}': base_url must be an http(s) URL, got '{}'",
            indexer.name, indexer.base_url
        ));
    }
    if indexer.timeout_seconds == 0 {
        return invalid(format!("indexer '{}': timeout_seconds cannot be 0", indexer.name));
    }
    if indexer.max_consecutive_errors == 0 {
        return invalid(format!(
            "indexer '{}': max_consecutive_errors cannot be 0",
            indexer.name
        ));
    }
    if let Some(tag) = &indexer.parser_type {
        if ParserKind::from_tag(tag).is_none() {
            return invalid(format!(
                "indexer '{}': unknown parser_type '{}'",
                indexer.name, tag
            ));
        }
    }
    if indexer.rate_limit == Some(0) || indexer.rate_interval == Some(0) {
        return invalid(format!(
            "indexer '{}': rate_limit and rate_interval must be positive",
            indexer.name
        ));
    }
    if let Some(path) = &indexer.search_path {
        if !path.contains("{query}") {
            return invalid(format!(
                "indexer '{}': search_path must contain a {{query}} placeholder",
                indexer.name
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(indexers: Vec<IndexerConfig>) -> Config {
        Config {
            indexers,
            ..Default::default()
        }
    }

    fn assert_invalid(config: &Config, needle: &str) {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let config = config_with(vec![
            IndexerConfig::new("a", "https://a.example"),
            IndexerConfig::new("b", "http://b.example:8080"),
        ]);
        assert!(validate_config(&config).is_ok());
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_duplicate_names_case_insensitive() {
        let config = config_with(vec![
            IndexerConfig::new("Site", "https://a.example"),
            IndexerConfig::new("site", "https://b.example"),
        ]);
        assert_invalid(&config, "duplicate");
    }

    #[test]
    fn test_validate_empty_name() {
        assert_invalid(&config_with(vec![IndexerConfig::new(" ", "https://a.example")]), "empty");
    }

    #[test]
    fn test_validate_base_url() {
        assert_invalid(
            &config_with(vec![IndexerConfig::new("a", "ftp://a.example")]),
            "base_url",
        );
        assert_invalid(&config_with(vec![IndexerConfig::new("a", "")]), "base_url");
    }

    #[test]
    fn test_validate_zero_limits() {
        let mut c = IndexerConfig::new("a", "https://a.example");
        c.timeout_seconds = 0;
        assert_invalid(&config_with(vec![c]), "timeout_seconds");

        let mut c = IndexerConfig::new("a", "https://a.example");
        c.max_consecutive_errors = 0;
        assert_invalid(&config_with(vec![c]), "max_consecutive_errors");

        let mut c = IndexerConfig::new("a", "https://a.example");
        c.rate_limit = Some(0);
        assert_invalid(&config_with(vec![c]), "rate_limit");
    }

    #[test]
    fn test_validate_parser_type() {
        let mut c = IndexerConfig::new("a", "https://a.example");
        c.parser_type = Some("torznab".to_string());
        assert_invalid(&config_with(vec![c]), "parser_type");
    }

    #[test]
    fn test_validate_search_path_placeholder() {
        let mut c = IndexerConfig::new("a", "https://a.example");
        c.search_path = Some("/browse.php?q=".to_string());
        assert_invalid(&config_with(vec![c]), "{query}");
    }

    #[test]
    fn test_validate_search_section() {
        let mut config = Config::default();
        config.search.per_indexer_timeout_secs = 0;
        assert_invalid(&config, "per_indexer_timeout_secs");

        let mut config = Config::default();
        config.search.site_guard_timeout_secs = 0;
        assert_invalid(&config, "site_guard_timeout_secs");

        let mut config = Config::default();
        config.decision.duplicate_similarity = 1.5;
        assert_invalid(&config, "duplicate_similarity");
    }
}
