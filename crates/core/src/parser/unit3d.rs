//! UNIT3D sites (`/torrents/{id}`, `/torrents/download/{id}`).

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::helpers::{element_text, parse_count, parse_date, parse_size, trailing_id};
use super::nexus_php::is_outer_row;
use super::{parse_detail_page, selector, DetailLayout, ParserKind, ParserStrategy, SiteContext, TorrentDetail};
use crate::searcher::{TorrentResult, UploadDate};

static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static NAME_LINK: Lazy<Selector> = Lazy::new(|| {
    selector("a.torrent-search--list__name, a.view-torrent, a[href*='/torrents/']")
});
static DOWNLOAD_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href*='/torrents/download/']"));
static MAGNET_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href^='magnet:']"));
static SIZE: Lazy<Selector> = Lazy::new(|| selector("[class*='size']"));
static SEEDERS: Lazy<Selector> = Lazy::new(|| selector("[class*='seeders']"));
static LEECHERS: Lazy<Selector> = Lazy::new(|| selector("[class*='leechers']"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("time"));
static CATEGORY: Lazy<Selector> =
    Lazy::new(|| selector("[class*='category'] [title], [class*='category'] img[alt]"));
static FREELEECH: Lazy<Selector> =
    Lazy::new(|| selector("[class*='freeleech'], [title*='Freeleech'], [title*='freeleech']"));
static HIT_AND_RUN: Lazy<Selector> =
    Lazy::new(|| selector("[class*='hit-and-run'], [title*='Hit and Run']"));

const DETAIL_LAYOUT: DetailLayout = DetailLayout {
    title: "h1.torrent__name, h1",
    description: "div.torrent__description, div.bbcode-rendered",
    download: "a[href*='/torrents/download/']",
    uploader: "a[href*='/users/']",
    category: "li.torrent__category, span.torrent__category",
};

#[derive(Debug, Clone)]
pub struct Unit3dParser {
    ctx: SiteContext,
}

impl Unit3dParser {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Option<TorrentResult> {
        let link = row.select(&NAME_LINK).find(|a| {
            let href = a.value().attr("href").unwrap_or_default();
            !href.contains("/download/") && !element_text(*a).is_empty()
        })?;
        let href = link.value().attr("href").unwrap_or_default();

        let mut result = TorrentResult::new(element_text(link), &self.ctx.site);
        result.details_url = self.ctx.url(href);
        result.torrent_id = row
            .value()
            .attr("data-torrent-id")
            .map(str::to_string)
            .or_else(|| trailing_id(href));
        result.torrent_url = row
            .select(&DOWNLOAD_LINK)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|h| self.ctx.url(h));
        result.magnet_link = row
            .select(&MAGNET_LINK)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .next();

        result.size_gb = row
            .select(&SIZE)
            .map(|el| parse_size(&element_text(el)))
            .find(|gb| *gb > 0.0)
            .unwrap_or(0.0);
        result.seeders = row
            .select(&SEEDERS)
            .find_map(|el| parse_count(&element_text(el)))
            .unwrap_or(0);
        result.leechers = row
            .select(&LEECHERS)
            .find_map(|el| parse_count(&element_text(el)))
            .unwrap_or(0);

        result.upload_date = row.select(&TIME).find_map(|t| {
            let attr = t
                .value()
                .attr("datetime")
                .or(t.value().attr("title"))
                .and_then(parse_date);
            match attr {
                Some(d @ UploadDate::Parsed(_)) => Some(d),
                _ => parse_date(&element_text(t)),
            }
        });

        result.category = row
            .select(&CATEGORY)
            .filter_map(|el| el.value().attr("title").or(el.value().attr("alt")))
            .map(str::trim)
            .find(|t| !t.is_empty())
            .map(str::to_string);

        let promo: Vec<String> = row
            .select(&FREELEECH)
            .map(|el| {
                format!(
                    "{} {}",
                    el.value().attr("title").unwrap_or_default(),
                    element_text(el)
                )
            })
            .collect();
        if !promo.is_empty() {
            let half = promo.iter().any(|p| p.contains("50%"));
            let full = promo.iter().any(|p| p.contains("100%"));
            result.is_half_free = half && !full;
            result.is_free = !result.is_half_free;
        }
        result.is_hr = row.select(&HIT_AND_RUN).next().is_some();

        self.ctx.finish(result)
    }
}

impl ParserStrategy for Unit3dParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Unit3d
    }

    fn parse_search_results(&self, html: &str) -> Vec<TorrentResult> {
        let doc = Html::parse_document(html);
        doc.select(&ROW)
            .filter(|row| is_outer_row(*row))
            .filter_map(|row| self.parse_row(row))
            .collect()
    }

    fn parse_detail(&self, html: &str) -> TorrentDetail {
        parse_detail_page(&self.ctx, &DETAIL_LAYOUT, html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const PAGE: &str = r#"
<table class="data-table">
<thead><tr><th>Format</th><th>Name</th><th>Age</th><th>Size</th><th>S</th><th>L</th></tr></thead>
<tbody>
<tr class="torrent-search--list__row" data-torrent-id="123">
  <td class="torrent-search--list__format">
    <div class="torrent-search--list__category"><i class="fas fa-film" title="Movie"></i></div>
  </td>
  <td class="torrent-search--list__overview">
    <a class="torrent-search--list__name" href="/torrents/123">Nice Movie 2022 720p WEB-DL H.264</a>
    <a href="/torrents/download/123" title="Download"><i class="fas fa-download"></i></a>
    <span class="torrent-icons"><i class="torrent-icons__freeleech" title="100% Freeleech"></i></span>
  </td>
  <td class="torrent-search--list__age"><time datetime="2024-01-05 10:30:00">3 days ago</time></td>
  <td class="torrent-search--list__size"><span>4.5 GiB</span></td>
  <td class="torrent-search--list__seeders"><a href="/torrents/123/peers"><span>12</span></a></td>
  <td class="torrent-search--list__leechers"><a href="/torrents/123/peers"><span>3</span></a></td>
</tr>
<tr class="torrent-search--list__row">
  <td class="torrent-search--list__format"></td>
  <td class="torrent-search--list__overview">
    <a class="torrent-search--list__name" href="https://u3d.example/torrents/124">Other Show S02 1080p</a>
    <a href="https://u3d.example/torrents/download/124">DL</a>
    <i class="torrent-icons__freeleech" title="50% Freeleech"></i>
  </td>
  <td class="torrent-search--list__age"><time>yesterday-ish</time></td>
  <td class="torrent-search--list__size">800 MiB</td>
  <td class="torrent-search--list__seeders">1,500</td>
  <td class="torrent-search--list__leechers">0</td>
</tr>
</tbody>
</table>
"#;

    fn parser() -> Unit3dParser {
        Unit3dParser::new(SiteContext::new("u3d", "https://u3d.example"))
    }

    #[test]
    fn test_parse_search_results() {
        let results = parser().parse_search_results(PAGE);
        assert_eq!(results.len(), 2);

        let r = &results[0];
        assert_eq!(r.title, "Nice Movie 2022 720p WEB-DL H.264");
        assert_eq!(r.torrent_id.as_deref(), Some("123"));
        assert_eq!(r.details_url.as_deref(), Some("https://u3d.example/torrents/123"));
        assert_eq!(
            r.torrent_url.as_deref(),
            Some("https://u3d.example/torrents/download/123")
        );
        assert!((r.size_gb - 4.5).abs() < 1e-9);
        assert_eq!(r.seeders, 12);
        assert_eq!(r.leechers, 3);
        assert_eq!(r.category.as_deref(), Some("Movie"));
        assert!(r.is_free);
        assert!(!r.is_half_free);
        assert_eq!(r.resolution.as_deref(), Some("720p"));
        assert_eq!(
            r.upload_date,
            Some(UploadDate::Parsed(
                Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap()
            ))
        );
    }

    #[test]
    fn test_half_freeleech_and_raw_date() {
        let results = parser().parse_search_results(PAGE);
        let r = &results[1];
        assert_eq!(r.torrent_id.as_deref(), Some("124"));
        assert!(r.is_half_free);
        assert!(!r.is_free);
        assert_eq!(r.seeders, 1500);
        assert_eq!(r.leechers, 0);
        assert_eq!(r.upload_date, Some(UploadDate::Raw("yesterday-ish".to_string())));
        assert!((r.size_gb - 800.0 / 1024.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_detail() {
        let html = r#"
<h1 class="torrent__name">Nice Movie 2022 720p WEB-DL H.264</h1>
<ul><li class="torrent__category">Movie</li><li>Size: 4.5 GiB</li><li>Seeders: 12</li><li>Leechers: 3</li></ul>
<a href="https://u3d.example/users/bob">bob</a>
<a href="/torrents/download/123">Download</a>
"#;
        let detail = parser().parse_detail(html);
        assert_eq!(detail.category.as_deref(), Some("Movie"));
        assert_eq!(detail.uploader.as_deref(), Some("bob"));
        assert_eq!(detail.seeders, Some(12));
        assert_eq!(detail.leechers, Some(3));
        assert!((detail.size_gb.unwrap() - 4.5).abs() < 1e-9);
        assert_eq!(
            detail.torrent_url.as_deref(),
            Some("https://u3d.example/torrents/download/123")
        );
    }
}
