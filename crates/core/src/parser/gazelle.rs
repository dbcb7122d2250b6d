//! Gazelle sites (`torrents.php?id=..&torrentid=..`, `action=download`).

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::helpers::{
    element_text, is_count, mentions_hit_and_run, parse_count, parse_date, parse_size, query_param,
};
use super::nexus_php::{direct_cells, is_outer_row};
use super::{parse_detail_page, selector, DetailLayout, ParserKind, ParserStrategy, SiteContext, TorrentDetail};
use crate::searcher::{TorrentResult, UploadDate};

static ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static TORRENT_LINK: Lazy<Selector> =
    Lazy::new(|| selector("a[href*='torrents.php?id='], a[href*='torrentid=']"));
static DOWNLOAD_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href*='action=download']"));
static MAGNET_LINK: Lazy<Selector> = Lazy::new(|| selector("a[href^='magnet:']"));
static TIME: Lazy<Selector> = Lazy::new(|| selector("span.time"));
static LABEL: Lazy<Selector> = Lazy::new(|| selector("strong.torrent_label, span.torrent_label"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| selector("div[title], img[title]"));

const DETAIL_LAYOUT: DetailLayout = DetailLayout {
    title: "div.header h2, h2",
    description: "div.torrent_description, div.box_description div.body, blockquote",
    download: "a[href*='action=download']",
    uploader: "a[href*='user.php?id=']",
    category: "span.category, div.header span.tags",
};

#[derive(Debug, Clone)]
pub struct GazelleParser {
    ctx: SiteContext,
}

impl GazelleParser {
    pub fn new(ctx: SiteContext) -> Self {
        Self { ctx }
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Option<TorrentResult> {
        let link = row.select(&TORRENT_LINK).find(|a| {
            let href = a.value().attr("href").unwrap_or_default();
            !href.contains("action=") && !element_text(*a).is_empty()
        })?;
        let href = link.value().attr("href").unwrap_or_default();

        let mut result = TorrentResult::new(element_text(link), &self.ctx.site);
        result.details_url = self.ctx.url(href);
        result.torrent_id = query_param(href, "torrentid").or_else(|| query_param(href, "id"));
        result.torrent_url = row
            .select(&DOWNLOAD_LINK)
            .filter_map(|a| a.value().attr("href"))
            .find_map(|h| self.ctx.url(h));
        result.magnet_link = row
            .select(&MAGNET_LINK)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .next();

        let cells = direct_cells(row);
        result.category = cells.first().and_then(|c| {
            c.select(&CATEGORY)
                .filter_map(|el| el.value().attr("title"))
                .map(str::trim)
                .find(|t| !t.is_empty())
                .map(str::to_string)
        });

        let size_idx = cells.iter().position(|c| {
            let text = element_text(*c);
            text.len() < 24 && parse_size(&text) > 0.0
        });
        if let Some(i) = size_idx {
            result.size_gb = parse_size(&element_text(cells[i]));
        }

        // Snatches, seeders, leechers follow the size column.
        let counts: Vec<u32> = cells
            .iter()
            .skip(size_idx.map_or(0, |i| i + 1))
            .map(|c| element_text(*c))
            .filter(|t| is_count(t))
            .filter_map(|t| parse_count(&t))
            .collect();
        let (seeders, leechers) = match counts.as_slice() {
            [_, s, l, ..] => (*s, *l),
            [s, l] => (*s, *l),
            [s] => (*s, 0),
            [] => (0, 0),
        };
        result.seeders = seeders;
        result.leechers = leechers;

        result.upload_date = row.select(&TIME).find_map(|span| {
            let parsed = span.value().attr("title").and_then(parse_date);
            match parsed {
                Some(d @ UploadDate::Parsed(_)) => Some(d),
                _ => parse_date(&element_text(span)),
            }
        });

        let labels: Vec<String> = row.select(&LABEL).map(element_text).collect();
        result.is_free = labels.iter().any(|l| l.to_lowercase().contains("freeleech"))
            || element_text(row).contains("Freeleech!");
        result.is_hr = labels.iter().any(|l| mentions_hit_and_run(l));

        self.ctx.finish(result)
    }
}

impl ParserStrategy for GazelleParser {
    fn kind(&self) -> ParserKind {
        ParserKind::Gazelle
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
