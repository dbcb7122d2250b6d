//! Title text patterns: comma-separated keywords or a `/regex/`.

use regex_lite::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum TextPattern {
    /// Any keyword is a case-insensitive substring of the title.
    Keywords(Vec<String>),
    /// Case-insensitive regex search.
    Regex(Regex),
    /// A `/regex/` that failed to compile.
    Invalid(String),
}

impl TextPattern {
    /// Parse a pattern. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let body = &raw[1..raw.len() - 1];
            return Some(match Regex::new(&format!("(?i){}", body)) {
                Ok(re) => TextPattern::Regex(re),
                Err(e) => {
                    warn!(pattern = %body, error = %e, "Invalid title regex");
                    TextPattern::Invalid(body.to_string())
                }
            });
        }

        let keywords: Vec<String> = raw
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            None
        } else {
            Some(TextPattern::Keywords(keywords))
        }
    }

    /// An invalid regex matches nothing, so as an include it admits no
    /// title and as an exclude it removes none.
    pub fn matches(&self, title: &str) -> bool {
        match self {
            TextPattern::Keywords(keywords) => {
                let lower = title.to_lowercase();
                keywords.iter().any(|k| lower.contains(k.as_str()))
            }
            TextPattern::Regex(re) => re.is_match(title),
            TextPattern::Invalid(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, TextPattern::Invalid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_or_case_insensitive() {
        let p = TextPattern::parse("CHD, WiKi").unwrap();
        assert!(p.matches("Show.S01.1080p.WEB-DL-chd"));
        assert!(p.matches("Show.S01.1080p-WIKI"));
        assert!(!p.matches("Show.S01.1080p-FRDS"));
    }

    #[test]
    fn test_regex_pattern() {
        let p = TextPattern::parse("/s0[12]e\\d+/").unwrap();
        assert!(p.matches("Show.S01E05.1080p"));
        assert!(!p.matches("Show.S03E05.1080p"));
    }

    #[test]
    fn test_invalid_regex_fallbacks() {
        let p = TextPattern::parse("/(unclosed/").unwrap();
        assert!(!p.is_valid());
        assert!(!p.matches("anything"));
    }

    #[test]
    fn test_blank_patterns() {
        assert!(TextPattern::parse("").is_none());
        assert!(TextPattern::parse("  , ,").is_none());
    }
}
