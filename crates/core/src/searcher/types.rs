//! Types shared by the search layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::parser::title::{parse_title, EpisodeInfo};

/// Broad content category of a subscription or search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tv,
    Anime,
    Music,
    Other,
}

impl MediaType {
    /// TV-like media is searched and filtered by season/episode.
    pub fn is_tv_like(self) -> bool {
        matches!(self, MediaType::Tv | MediaType::Anime)
    }

    /// Word appended to a query to build the type-hinted search variant.
    pub fn search_hint(self) -> Option<&'static str> {
        match self {
            MediaType::Tv | MediaType::Anime => Some("season"),
            MediaType::Movie => Some("movie"),
            MediaType::Music | MediaType::Other => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
            MediaType::Anime => "anime",
            MediaType::Music => "music",
            MediaType::Other => "other",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" | "film" => Ok(MediaType::Movie),
            "tv" | "series" | "show" => Ok(MediaType::Tv),
            "anime" => Ok(MediaType::Anime),
            "music" | "audio" => Ok(MediaType::Music),
            "other" => Ok(MediaType::Other),
            other => Err(format!("unknown media type: {}", other)),
        }
    }
}

/// Upload time of a listing.
///
/// Sites render dates in many formats; anything that cannot be parsed is
/// kept verbatim so no information is lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadDate {
    Parsed(DateTime<Utc>),
    Raw(String),
}

impl UploadDate {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            UploadDate::Parsed(dt) => Some(*dt),
            UploadDate::Raw(_) => None,
        }
    }
}

/// One listing found on one site.
///
/// Produced by a parser and never mutated afterwards; downstream stages
/// filter, reorder and clone but do not edit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentResult {
    pub title: String,
    /// Indexer (site) name the listing came from.
    pub site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_link: Option<String>,
    /// Lowercase hex BitTorrent v1 hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
    /// Site-local torrent id, when the listing link carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torrent_id: Option<String>,
    #[serde(default)]
    pub size_gb: f64,
    #[serde(default)]
    pub seeders: u32,
    #[serde(default)]
    pub leechers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<UploadDate>,
    #[serde(default)]
    pub is_hr: bool,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub is_half_free: bool,
}

impl TorrentResult {
    /// Create an empty record for a site. Parsers fill in the rest.
    pub fn new(title: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            site: site.into(),
            torrent_url: None,
            magnet_link: None,
            info_hash: None,
            details_url: None,
            torrent_id: None,
            size_gb: 0.0,
            seeders: 0,
            leechers: 0,
            resolution: None,
            quality: None,
            codec: None,
            source: None,
            language: None,
            category: None,
            upload_date: None,
            is_hr: false,
            is_free: false,
            is_half_free: false,
        }
    }

    /// Whether the record carries something a download client can use.
    pub fn has_link(&self) -> bool {
        self.torrent_url.as_deref().is_some_and(|s| !s.is_empty())
            || self.magnet_link.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// A record is emitted only with a non-empty title and a link.
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && self.has_link()
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        self.upload_date.as_ref().and_then(UploadDate::as_datetime)
    }

    /// Identifier used when asking a site about this listing.
    pub fn identifier(&self) -> &str {
        self.torrent_id
            .as_deref()
            .or(self.info_hash.as_deref())
            .unwrap_or(&self.title)
    }

    /// Season/episode coverage parsed from the title.
    pub fn episodes(&self) -> EpisodeInfo {
        EpisodeInfo::parse(&self.title)
    }

    /// Fill classification fields the site did not provide from the title.
    pub fn fill_from_title(&mut self) {
        let info = parse_title(&self.title);
        if self.resolution.is_none() {
            self.resolution = info.resolution;
        }
        if self.quality.is_none() {
            self.quality = info.quality;
        }
        if self.codec.is_none() {
            self.codec = info.codec;
        }
        if self.source.is_none() {
            self.source = info.source;
        }
        if self.language.is_none() {
            self.language = info.language;
        }
    }
}

/// Inbound search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Restrict to these indexers (matched case-insensitively).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexer_names: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_indexers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexer_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Query variants sent to a site, in order, without repeats.
    ///
    /// The bare query comes first, then the query with the year, then the
    /// query with a media-type hint. `limit` caps the number of variants.
    pub fn query_variants(&self, limit: usize) -> Vec<String> {
        let base = self.query.trim();
        let mut variants = vec![base.to_string()];
        if let Some(year) = self.year {
            variants.push(format!("{} {}", base, year));
        }
        if let Some(hint) = self.media_type.and_then(MediaType::search_hint) {
            variants.push(format!("{} {}", base, hint));
        }
        let mut seen = Vec::with_capacity(variants.len());
        for v in variants {
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        seen.truncate(limit.max(1));
        seen
    }
}
