//! Classification of release titles.
//!
//! Extracts resolution, codec, source and language tags plus season/episode
//! coverage from a free-form listing title.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static RESOLUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(2160p|4k|uhd|1080p|1080i|720p|576p|480p)\b").unwrap()
});

static CODEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(x\.?265|h\.?265|hevc|x\.?264|h\.?264|avc|av1|vp9|xvid)\b").unwrap()
});

static SOURCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(remux|blu-?ray|bdrip|brrip|web-?dl|webrip|web|hdtv|dvdrip|dvd|hdrip)\b")
        .unwrap()
});

static LANGUAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(中英|中字|简繁|国语|國語|粤语|粵語|\bchs\b|\bcht\b|\bmulti\b|\benglish\b|\beng\b|\bfrench\b|\bgerman\b|\bjapanese\b|\bkorean\b)",
    )
    .unwrap()
});

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bS(\d{1,2})E(\d{1,4})(?:\s*-\s*(?:S\d{1,2})?E?(\d{1,4}))?").unwrap()
});

static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})(?:\s*-\s*S?(\d{1,2}))?\b").unwrap());

static SEASON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bseason\s*(\d{1,2})\b").unwrap());

static CN_SEASON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第\s*([0-9一二三四五六七八九十]{1,3})\s*季").unwrap());

static CN_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"第\s*(\d{1,4})(?:\s*-\s*(\d{1,4}))?\s*[集话話]").unwrap()
});

static EPISODE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bEP?(\d{1,4})(?:\s*-\s*(?:EP?)?(\d{1,4}))?\b").unwrap());

/// Classification tags found in a title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleInfo {
    /// Normalized resolution: `2160p`, `1080p`, `720p`, ...
    pub resolution: Option<String>,
    /// The resolution token as it was written (`4K`, `1080P`, ...).
    pub quality: Option<String>,
    pub codec: Option<String>,
    pub source: Option<String>,
    pub language: Option<String>,
}

/// Parse classification tags from a title.
pub fn parse_title(title: &str) -> TitleInfo {
    let mut info = TitleInfo::default();

    if let Some(m) = RESOLUTION.captures(title).and_then(|c| c.get(1)) {
        info.resolution = normalize_resolution(m.as_str());
        info.quality = Some(m.as_str().to_uppercase());
    }

    if let Some(m) = CODEC.captures(title).and_then(|c| c.get(1)) {
        info.codec = Some(normalize_codec(m.as_str()));
    }

    let lower = title.to_lowercase();
    if lower.contains("remux") {
        info.source = Some("Remux".to_string());
    } else if let Some(m) = SOURCE.captures(title).and_then(|c| c.get(1)) {
        info.source = Some(normalize_source(m.as_str()));
    }

    if let Some(m) = LANGUAGE.captures(title).and_then(|c| c.get(1)) {
        info.language = Some(normalize_language(m.as_str()));
    }

    info
}

/// Map a resolution token to its canonical form.
pub fn normalize_resolution(token: &str) -> Option<String> {
    let t = token.trim().to_ascii_lowercase();
    let canonical = match t.as_str() {
        "2160p" | "4k" | "uhd" => "2160p",
        "1080p" | "1080i" | "fhd" => "1080p",
        "720p" | "hd" => "720p",
        "576p" => "576p",
        "480p" | "sd" => "480p",
        _ => return None,
    };
    Some(canonical.to_string())
}

/// Rank of a canonical resolution; higher is sharper.
pub fn resolution_tier(resolution: &str) -> Option<u8> {
    match normalize_resolution(resolution)?.as_str() {
        "2160p" => Some(4),
        "1080p" => Some(3),
        "720p" => Some(2),
        "576p" | "480p" => Some(1),
        _ => None,
    }
}

fn normalize_codec(token: &str) -> String {
    let t = token.to_ascii_lowercase().replace('.', "");
    match t.as_str() {
        "x265" | "h265" | "hevc" => "H.265".to_string(),
        "x264" | "h264" | "avc" => "H.264".to_string(),
        "av1" => "AV1".to_string(),
        "vp9" => "VP9".to_string(),
        "xvid" => "XviD".to_string(),
        _ => token.to_string(),
    }
}

fn normalize_source(token: &str) -> String {
    let t = token.to_ascii_lowercase().replace('-', "");
    match t.as_str() {
        "bluray" => "BluRay",
        "bdrip" | "brrip" => "BDRip",
        "webdl" => "WEB-DL",
        "webrip" => "WEBRip",
        "web" => "WEB",
        "hdtv" => "HDTV",
        "dvdrip" | "dvd" => "DVD",
        "hdrip" => "HDRip",
        _ => return token.to_string(),
    }
    .to_string()
}

fn normalize_language(token: &str) -> String {
    match token.to_lowercase().as_str() {
        "中英" => "Chinese/English",
        "中字" | "简繁" | "chs" | "cht" => "Chinese",
        "国语" | "國語" => "Mandarin",
        "粤语" | "粵語" => "Cantonese",
        "multi" => "Multi",
        "english" | "eng" => "English",
        "french" => "French",
        "german" => "German",
        "japanese" => "Japanese",
        "korean" => "Korean",
        _ => return token.to_string(),
    }
    .to_string()
}

/// Season and episode coverage of a release, as inclusive ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub seasons: Option<(u32, u32)>,
    pub episodes: Option<(u32, u32)>,
}

impl EpisodeInfo {
    /// Parse season/episode markers such as `S01E02`, `S01E01-E10`, `S01-S03`,
    /// `Season 2`, `第2季`, `第3集` and `EP05`.
    pub fn parse(title: &str) -> Self {
        let mut info = EpisodeInfo::default();

        if let Some(caps) = SEASON_EPISODE.captures(title) {
            let season = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let start = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let end = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .or(start);
            if let Some(s) = season {
                info.seasons = Some((s, s));
            }
            if let (Some(a), Some(b)) = (start, end) {
                info.episodes = Some(ordered(a, b));
            }
            return info;
        }

        if let Some(caps) = SEASON_RANGE.captures(title) {
            let start: Option<u32> = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let end = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .or(start);
            if let (Some(a), Some(b)) = (start, end) {
                info.seasons = Some(ordered(a, b));
            }
        } else if let Some(s) = SEASON_WORD
            .captures(title)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            info.seasons = Some((s, s));
        } else if let Some(s) = CN_SEASON
            .captures(title)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_number(m.as_str()))
        {
            info.seasons = Some((s, s));
        }

        let episode_caps = CN_EPISODE
            .captures(title)
            .or_else(|| EPISODE_ONLY.captures(title));
        if let Some(caps) = episode_caps {
            let start: Option<u32> = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let end = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .or(start);
            if let (Some(a), Some(b)) = (start, end) {
                info.episodes = Some(ordered(a, b));
            }
        }

        info
    }

    /// `None` when the title carries no season marker.
    pub fn covers_season(&self, season: u32) -> Option<bool> {
        self.seasons.map(|(a, b)| a <= season && season <= b)
    }

    /// Whether the episode range overlaps `[start, end]`; an open end means
    /// "everything from `start` on". `None` when no episode marker exists.
    pub fn overlaps_episodes(&self, start: u32, end: Option<u32>) -> Option<bool> {
        self.episodes.map(|(a, b)| {
            let window_end = end.unwrap_or(u32::MAX);
            a <= window_end && start <= b
        })
    }
}

fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Parse an ASCII or Chinese numeral up to 99.
fn parse_number(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse() {
        return Some(n);
    }
    let digit = |c: char| "零一二三四五六七八九".chars().position(|d| d == c);
    let chars: Vec<char> = s.chars().collect();
    match chars.as_slice() {
        ['十'] => Some(10),
        ['十', u] => digit(*u).map(|u| 10 + u as u32),
        [t, '十'] => digit(*t).map(|t| t as u32 * 10),
        [t, '十', u] => Some(digit(*t)? as u32 * 10 + digit(*u)? as u32),
        [u] => digit(*u).map(|u| u as u32),
        _ => None,
    }
}

/// Jaccard similarity of normalized word sets, scaled by the length ratio.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let words = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .map(String::from)
            .collect()
    };

    let (wa, wb) = (words(a), words(b));
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }

    let intersection = wa.intersection(&wb).count() as f64;
    let union = wa.union(&wb).count() as f64;
    let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
    (intersection / union) * (la.min(lb) / la.max(lb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_title_tags() {
        let info = parse_title("The.Movie.2023.2160p.UHD.BluRay.x265.10bit-GRP");
        assert_eq!(info.resolution.as_deref(), Some("2160p"));
        assert_eq!(info.quality.as_deref(), Some("2160P"));
        assert_eq!(info.codec.as_deref(), Some("H.265"));
        assert_eq!(info.source.as_deref(), Some("BluRay"));
    }

    #[test]
    fn test_parse_title_web_and_language() {
        let info = parse_title("某剧 第1季 1080p WEB-DL H.264 中英双字");
        assert_eq!(info.resolution.as_deref(), Some("1080p"));
        assert_eq!(info.source.as_deref(), Some("WEB-DL"));
        assert_eq!(info.codec.as_deref(), Some("H.264"));
        assert_eq!(info.language.as_deref(), Some("Chinese/English"));
    }

    #[test]
    fn test_remux_beats_bluray() {
        let info = parse_title("Film 1080p Blu-ray REMUX AVC");
        assert_eq!(info.source.as_deref(), Some("Remux"));
    }

    #[test]
    fn test_parse_title_without_tags() {
        assert_eq!(parse_title("just some words"), TitleInfo::default());
    }

    #[test]
    fn test_resolution_tier() {
        assert_eq!(resolution_tier("4K"), Some(4));
        assert_eq!(resolution_tier("1080p"), Some(3));
        assert_eq!(resolution_tier("720P"), Some(2));
        assert_eq!(resolution_tier("potato"), None);
    }

    #[test]
    fn test_episode_patterns() {
        let e = EpisodeInfo::parse("Show.S01E02.1080p");
        assert_eq!(e.seasons, Some((1, 1)));
        assert_eq!(e.episodes, Some((2, 2)));

        let e = EpisodeInfo::parse("Show S02E01-E10 WEB");
        assert_eq!(e.seasons, Some((2, 2)));
        assert_eq!(e.episodes, Some((1, 10)));

        let e = EpisodeInfo::parse("Show S01-S03 Complete");
        assert_eq!(e.seasons, Some((1, 3)));
        assert_eq!(e.episodes, None);

        let e = EpisodeInfo::parse("Show Season 4 Pack");
        assert_eq!(e.seasons, Some((4, 4)));

        let e = EpisodeInfo::parse("Anime EP05 720p");
        assert_eq!(e.seasons, None);
        assert_eq!(e.episodes, Some((5, 5)));
    }

    #[test]
    fn test_chinese_episode_markers() {
        let e = EpisodeInfo::parse("某剧 第二季 第3集");
        assert_eq!(e.seasons, Some((2, 2)));
        assert_eq!(e.episodes, Some((3, 3)));

        let e = EpisodeInfo::parse("某剧 第12季");
        assert_eq!(e.seasons, Some((12, 12)));

        let e = EpisodeInfo::parse("某剧 第十一季 第1-8集");
        assert_eq!(e.seasons, Some((11, 11)));
        assert_eq!(e.episodes, Some((1, 8)));
    }

    #[test]
    fn test_no_episode_markers() {
        let e = EpisodeInfo::parse("Movie.2020.1080p.BluRay");
        assert_eq!(e, EpisodeInfo::default());
        assert_eq!(e.covers_season(1), None);
        assert_eq!(e.overlaps_episodes(1, None), None);
    }

    #[test]
    fn test_window_checks() {
        let e = EpisodeInfo::parse("Show S01E05-E08");
        assert_eq!(e.covers_season(1), Some(true));
        assert_eq!(e.covers_season(2), Some(false));
        assert_eq!(e.overlaps_episodes(1, Some(4)), Some(false));
        assert_eq!(e.overlaps_episodes(8, None), Some(true));
        assert_eq!(e.overlaps_episodes(6, Some(6)), Some(true));
    }

    #[test]
    fn test_similarity() {
        assert_eq!(title_similarity("Show S01E01 1080p", "Show S01E01 1080p"), 1.0);
        assert_eq!(title_similarity("", "x"), 0.0);
        let partial = title_similarity("Show.S01E01.1080p", "Show.S01E02.1080p");
        assert!(partial > 0.0 && partial < 0.8);
    }
}
