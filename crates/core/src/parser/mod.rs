//! Site page parsers.
//!
//! Private trackers run on a handful of software families. Each family
//! renders search results and detail pages with its own markup, so each gets
//! a [`ParserStrategy`]; the families differ only in the selectors they use
//! and all emit the same [`TorrentResult`] shape.

mod gazelle;
pub mod helpers;
mod nexus_php;
pub mod title;
mod unit3d;

pub use gazelle::GazelleParser;
pub use nexus_php::NexusPhpParser;
pub use title::{parse_title, title_similarity, EpisodeInfo, TitleInfo};
pub use unit3d::Unit3dParser;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::searcher::TorrentResult;
use helpers::{
    absolute_url, collapse_whitespace, element_text, extract_info_hash, mentions_hit_and_run,
    parse_size,
};

/// Site software family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    Gazelle,
    NexusPhp,
    Unit3d,
}

impl ParserKind {
    /// Resolve a configured parser tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "gazelle" => Some(ParserKind::Gazelle),
            "nexus_php" | "nexusphp" | "nexus" => Some(ParserKind::NexusPhp),
            "unit3d" => Some(ParserKind::Unit3d),
            _ => None,
        }
    }

    /// Guess the family from the site URL; NexusPHP is by far the most common.
    pub fn detect(base_url: &str) -> Self {
        let url = base_url.to_ascii_lowercase();
        if ["gazelle", "ptp", "btn"].iter().any(|k| url.contains(k)) {
            ParserKind::Gazelle
        } else if url.contains("unit3d") {
            ParserKind::Unit3d
        } else {
            ParserKind::NexusPhp
        }
    }

    /// An explicit tag wins; otherwise the URL is sniffed.
    pub fn resolve(tag: Option<&str>, base_url: &str) -> Self {
        tag.and_then(Self::from_tag)
            .unwrap_or_else(|| Self::detect(base_url))
    }

    /// Search path template used when the indexer does not configure one.
    pub fn default_search_path(self) -> &'static str {
        match self {
            ParserKind::Gazelle => "/torrents.php?searchstr={query}",
            ParserKind::NexusPhp => "/torrents.php?search={query}",
            ParserKind::Unit3d => "/torrents?name={query}",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParserKind::Gazelle => "gazelle",
            ParserKind::NexusPhp => "nexus_php",
            ParserKind::Unit3d => "unit3d",
        };
        f.write_str(s)
    }
}

/// Fields read from a single torrent's detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentDetail {
    pub title: Option<String>,
    pub description: Option<String>,
    pub torrent_url: Option<String>,
    pub magnet_link: Option<String>,
    pub info_hash: Option<String>,
    pub size_gb: Option<f64>,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub uploader: Option<String>,
    pub category: Option<String>,
}

/// Turns a site's HTML into canonical records.
///
/// Parsing never fails: malformed rows are skipped and a page without
/// recognizable rows yields an empty list.
pub trait ParserStrategy: Send + Sync {
    fn kind(&self) -> ParserKind;

    fn parse_search_results(&self, html: &str) -> Vec<TorrentResult>;

    fn parse_detail(&self, html: &str) -> TorrentDetail;
}

/// Parser chosen for one site.
#[derive(Debug, Clone)]
pub enum SiteParser {
    Gazelle(GazelleParser),
    NexusPhp(NexusPhpParser),
    Unit3d(Unit3dParser),
}

impl SiteParser {
    pub fn new(kind: ParserKind, site: &str, base_url: &str) -> Self {
        let ctx = SiteContext::new(site, base_url);
        match kind {
            ParserKind::Gazelle => SiteParser::Gazelle(GazelleParser::new(ctx)),
            ParserKind::NexusPhp => SiteParser::NexusPhp(NexusPhpParser::new(ctx)),
            ParserKind::Unit3d => SiteParser::Unit3d(Unit3dParser::new(ctx)),
        }
    }

    fn inner(&self) -> &dyn ParserStrategy {
        match self {
            SiteParser::Gazelle(p) => p,
            SiteParser::NexusPhp(p) => p,
            SiteParser::Unit3d(p) => p,
        }
    }
}

impl ParserStrategy for SiteParser {
    fn kind(&self) -> ParserKind {
        self.inner().kind()
    }

    fn parse_search_results(&self, html: &str) -> Vec<TorrentResult> {
        self.inner().parse_search_results(html)
    }

    fn parse_detail(&self, html: &str) -> TorrentDetail {
        self.inner().parse_detail(html)
    }
}

/// Site identity a parser stamps onto its records.
#[derive(Debug, Clone)]
pub struct SiteContext {
    pub site: String,
    pub base_url: String,
}

impl SiteContext {
    pub fn new(site: &str, base_url: &str) -> Self {
        Self {
            site: site.to_string(),
            base_url: base_url.to_string(),
        }
    }

    pub fn url(&self, href: &str) -> Option<String> {
        absolute_url(&self.base_url, href)
    }

    /// Validate and complete a parsed row. Rows without a title or a link
    /// are dropped. An H&R marker in the title sets `is_hr` even when the
    /// site markup carries no badge.
    pub fn finish(&self, mut result: TorrentResult) -> Option<TorrentResult> {
        result.title = collapse_whitespace(&result.title);
        result.site = self.site.clone();
        if result.info_hash.is_none() {
            result.info_hash = result.magnet_link.as_deref().and_then(extract_info_hash);
        }
        if !result.is_valid() {
            return None;
        }
        result.is_hr = result.is_hr || mentions_hit_and_run(&result.title);
        result.fill_from_title();
        Some(result)
    }
}

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Selectors that differ between families on a detail page.
pub(crate) struct DetailLayout {
    pub title: &'static str,
    pub description: &'static str,
    pub download: &'static str,
    pub uploader: &'static str,
    pub category: &'static str,
}

static DETAIL_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:size|大小)\s*[:：]?\s*(\d+(?:[.,]\d+)*\s*[KMGT]?i?B)").unwrap()
});
static DETAIL_SEEDERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:seeders|做种者?|做種)\s*[:：]?\s*(\d+)").unwrap());
static DETAIL_LEECHERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:leechers|下载者|下載者)\s*[:：]?\s*(\d+)").unwrap());

/// Detail-page extraction shared by all families.
pub(crate) fn parse_detail_page(ctx: &SiteContext, layout: &DetailLayout, html: &str) -> TorrentDetail {
    let doc = Html::parse_document(html);
    let mut detail = TorrentDetail::default();

    detail.title = doc
        .select(&selector(layout.title))
        .map(element_text)
        .find(|t| t.chars().count() > 5);

    detail.description = doc
        .select(&selector(layout.description))
        .map(element_text)
        .find(|t| !t.is_empty());

    detail.magnet_link = doc
        .select(&selector("a[href^='magnet:']"))
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .next();
    detail.info_hash = detail.magnet_link.as_deref().and_then(extract_info_hash);

    detail.torrent_url = doc
        .select(&selector(layout.download))
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| ctx.url(href));

    detail.uploader = doc
        .select(&selector(layout.uploader))
        .map(element_text)
        .find(|t| !t.is_empty());

    detail.category = doc
        .select(&selector(layout.category))
        .map(element_text)
        .find(|t| !t.is_empty());

    let text = collapse_whitespace(&doc.root_element().text().collect::<Vec<_>>().join(" "));
    detail.size_gb = DETAIL_SIZE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| parse_size(m.as_str()))
        .filter(|gb| *gb > 0.0);
    detail.seeders = DETAIL_SEEDERS
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    detail.leechers = DETAIL_LEECHERS
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_kind_from_tag() {
        assert_eq!(ParserKind::from_tag("Gazelle"), Some(ParserKind::Gazelle));
        assert_eq!(ParserKind::from_tag("nexusphp"), Some(ParserKind::NexusPhp));
        assert_eq!(ParserKind::from_tag("nexus_php"), Some(ParserKind::NexusPhp));
        assert_eq!(ParserKind::from_tag("unit3d"), Some(ParserKind::Unit3d));
        assert_eq!(ParserKind::from_tag("torznab"), None);
    }

    #[test]
    fn test_parser_kind_detect() {
        assert_eq!(ParserKind::detect("https://passthepopcorn.me"), ParserKind::Gazelle);
        assert_eq!(ParserKind::detect("https://ptp.example"), ParserKind::Gazelle);
        assert_eq!(ParserKind::detect("https://unit3d.example"), ParserKind::Unit3d);
        assert_eq!(ParserKind::detect("https://pt.example.org"), ParserKind::NexusPhp);
    }

    #[test]
    fn test_parser_kind_resolve_prefers_tag() {
        assert_eq!(
            ParserKind::resolve(Some("unit3d"), "https://ptp.example"),
            ParserKind::Unit3d
        );
        assert_eq!(
            ParserKind::resolve(Some("bogus"), "https://ptp.example"),
            ParserKind::Gazelle
        );
        assert_eq!(ParserKind::resolve(None, "https://x.org"), ParserKind::NexusPhp);
    }

    #[test]
    fn test_site_parser_dispatch() {
        let parser = SiteParser::new(ParserKind::Unit3d, "u3d", "https://u3d.example");
        assert_eq!(parser.kind(), ParserKind::Unit3d);
        assert!(parser.parse_search_results("<html></html>").is_empty());
    }

    #[test]
    fn test_finish_drops_rows_without_link() {
        let ctx = SiteContext::new("site", "https://pt.example.org");
        assert!(ctx.finish(TorrentResult::new("Title 1080p", "")).is_none());

        let mut row = TorrentResult::new("  Title   1080p ", "");
        row.magnet_link =
            Some("magnet:?xt=urn:btih:C9E15763F722F23E98A29DECDFAE341B98D53056".to_string());
        let row = ctx.finish(row).unwrap();
        assert_eq!(row.title, "Title 1080p");
        assert_eq!(row.site, "site");
        assert_eq!(
            row.info_hash.as_deref(),
            Some("c9e15763f722f23e98a29decdfae341b98d53056")
        );
        assert_eq!(row.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_finish_flags_hit_and_run_titles() {
        let ctx = SiteContext::new("site", "https://pt.example.org");
        let row = |title: &str| {
            let mut r = TorrentResult::new(title, "");
            r.torrent_url = Some("https://pt.example.org/download.php?id=1".to_string());
            ctx.finish(r).unwrap()
        };

        assert!(row("Film 2020 1080p BluRay [HnR]").is_hr);
        assert!(row("Film 2020 1080p Hit & Run").is_hr);
        assert!(row("Show S01E01 1080p WEB-DL H5").is_hr);
        assert!(!row("Film.2020.1080p.WEB-DL.H.264-GRP").is_hr);
        assert!(!row("Film 2020 2160p HDR10 HEVC").is_hr);
    }
}
