//! Field extraction shared by every site family.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::ElementRef;

use crate::searcher::UploadDate;

static BTIH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)xt=urn:btih:([0-9a-z]+)").unwrap());

static SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s*(TIB|TB|GIB|GB|MIB|MB|KIB|KB|B)\b").unwrap()
});

static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(second|sec|minute|min|hour|hr|day|week|month|year)s?\s+ago").unwrap()
});

static RELATIVE_CN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*(秒|分钟|分鐘|小时|小時|天|周|週|个月|個月|月|年)前").unwrap());

static COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d,]*").unwrap());

// `HR` alone is left out: `HR-HDTV` is a common release tag.
static HIT_AND_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bH\s*[&/／＆]\s*R\b|\bHnR\b|\bhit\s*(?:&|and)?\s*run\b").unwrap()
});

// Levels such as `H3` or `H-5`. The trailing boundary keeps `H264` and
// `H.265` out, and `HDR10` never has a digit right after the `H`.
static HIT_AND_RUN_LEVEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bH\s*[-/:：]?\s*(?:10|[1-9])\b").unwrap());

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%b %d %Y, %H:%M",
    "%b %d %Y %H:%M",
    "%d %b %Y, %H:%M",
];

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%b %d %Y"];

/// Extract the lowercase hex info hash from a magnet URI.
///
/// Accepts both 40-character hex and 32-character base32 `btih` values,
/// wherever `xt` appears among the query parameters.
pub fn extract_info_hash(magnet: &str) -> Option<String> {
    let value = BTIH.captures(magnet)?.get(1)?.as_str();
    match value.len() {
        40 if value.chars().all(|c| c.is_ascii_hexdigit()) => Some(value.to_ascii_lowercase()),
        32 => decode_base32(value).map(|bytes| {
            bytes.iter().map(|b| format!("{:02x}", b)).collect()
        }),
        _ => None,
    }
}

fn decode_base32(input: &str) -> Option<Vec<u8>> {
    let mut bits: u64 = 0;
    let mut bit_count = 0u32;
    let mut out = Vec::with_capacity(20);
    for c in input.chars() {
        let v = match c.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        bits = (bits << 5) | v;
        bit_count += 5;
        if bit_count >= 8 {
            bit_count -= 8;
            out.push((bits >> bit_count) as u8);
            bits &= (1 << bit_count) - 1;
        }
    }
    (out.len() == 20).then_some(out)
}

/// Parse a human-readable size into gigabytes (base 1024).
///
/// Unparseable text yields `0.0`.
pub fn parse_size(text: &str) -> f64 {
    let Some(caps) = SIZE.captures(text) else {
        return 0.0;
    };
    let number = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_default();

    let value: f64 = normalize_number(number).parse().unwrap_or(0.0);
    let factor = match unit.trim_end_matches('B').trim_end_matches('I') {
        "T" => 1024.0,
        "G" => 1.0,
        "M" => 1.0 / 1024.0,
        "K" => 1.0 / (1024.0 * 1024.0),
        "" => 1.0 / (1024.0 * 1024.0 * 1024.0),
        _ => 0.0,
    };
    let gb = value * factor;
    if gb.is_finite() && gb >= 0.0 {
        gb
    } else {
        0.0
    }
}

/// `1,234.5` and `1.234,5` both become `1234.5`; a lone comma is a decimal point.
fn normalize_number(raw: &str) -> String {
    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');
    match (last_dot, last_comma) {
        (Some(d), Some(c)) if c > d => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (None, Some(c)) if raw.len() - c - 1 == 3 => raw.replace(',', ""),
        (None, Some(_)) => raw.replace(',', "."),
        _ => raw.to_string(),
    }
}

/// Parse an upload date against the known absolute and relative formats.
///
/// Empty input yields `None`; anything unrecognized is kept as
/// [`UploadDate::Raw`].
pub fn parse_date(text: &str) -> Option<UploadDate> {
    parse_date_at(text, Utc::now())
}

/// Like [`parse_date`] with an explicit reference time for relative dates.
pub fn parse_date_at(text: &str, now: DateTime<Utc>) -> Option<UploadDate> {
    let text = collapse_whitespace(text);
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(UploadDate::Parsed(dt.with_timezone(&Utc)));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(UploadDate::Parsed(Utc.from_utc_datetime(&naive)));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, fmt) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Some(UploadDate::Parsed(Utc.from_utc_datetime(&naive)));
            }
        }
    }

    let lower = text.to_lowercase();
    if lower == "just now" || lower == "now" || text == "刚刚" || text == "剛剛" {
        return Some(UploadDate::Parsed(now));
    }
    if let Some(then) = relative_offset(&text).and_then(|ago| now.checked_sub_signed(ago)) {
        return Some(UploadDate::Parsed(then));
    }

    Some(UploadDate::Raw(text))
}

/// Offset for "N units ago". `None` when the text is not relative or the
/// offset does not fit a `Duration`.
fn relative_offset(text: &str) -> Option<Duration> {
    let (n, unit_secs) = if let Some(caps) = RELATIVE_EN.captures(text) {
        let n: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
            "second" | "sec" => 1,
            "minute" | "min" => MINUTE,
            "hour" | "hr" => HOUR,
            "day" => DAY,
            "week" => 7 * DAY,
            "month" => 30 * DAY,
            "year" => 365 * DAY,
            _ => return None,
        };
        (n, unit)
    } else {
        let caps = RELATIVE_CN.captures(text)?;
        let n: i64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = match caps.get(2)?.as_str() {
            "秒" => 1,
            "分钟" | "分鐘" => MINUTE,
            "小时" | "小時" => HOUR,
            "天" => DAY,
            "周" | "週" => 7 * DAY,
            "个月" | "個月" | "月" => 30 * DAY,
            "年" => 365 * DAY,
            _ => return None,
        };
        (n, unit)
    };
    Duration::try_seconds(n.checked_mul(unit_secs)?)
}

/// First integer in the text, ignoring thousands separators.
pub fn parse_count(text: &str) -> Option<u32> {
    COUNT
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// Whether the text is a plain integer (a seeders/leechers style cell).
pub fn is_count(text: &str) -> bool {
    let t = text.trim();
    !t.is_empty() && t.chars().all(|c| c.is_ascii_digit() || c == ',')
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a possibly relative link against the site's base URL.
pub fn absolute_url(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    if href.starts_with("magnet:") {
        return Some(href.to_string());
    }
    let base = reqwest::Url::parse(base_url).ok()?;
    base.join(href).ok().map(String::from)
}

/// Value of a query parameter in a link (`id` in `details.php?id=42`).
pub fn query_param(href: &str, key: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}

/// Last purely numeric path segment of a link (`/torrents/123` gives `123`).
pub fn trailing_id(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next()?;
    path.rsplit('/')
        .find(|seg| !seg.is_empty())
        .filter(|seg| seg.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Whether listing text marks a Hit-and-Run torrent.
pub fn mentions_hit_and_run(text: &str) -> bool {
    HIT_AND_RUN.is_match(text) || HIT_AND_RUN_LEVEL.is_match(text)
}
